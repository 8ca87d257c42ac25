//! Session management for Parlor.
//!
//! This crate owns the binding between transport connections and
//! authenticated users:
//!
//! 1. **Registration** — every accepted connection gets a session and a
//!    client guid ([`SessionRegistry::register`]).
//! 2. **Authentication** — credentials are checked by the external
//!    [`AccountValidator`]; the registry then binds the user, enforcing
//!    one live session per username.
//! 3. **Teardown** — unregistering unbinds the user and hands it back so
//!    the caller can clean up room memberships.
//!
//! ```text
//! Room layer (above)    ← resolves member guids through sessions
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below) ← provides ClientId and wire payload types
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod registry;
mod session;
mod validator;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{OutboundMessage, OutboundSender, Session, User};
pub use validator::AccountValidator;
