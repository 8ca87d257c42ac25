//! Room management for Parlor.
//!
//! # Key types
//!
//! - [`Room`] — one capacity-bounded group: owner, members, bans,
//!   approvals, lock state, with validate-then-apply mutations
//! - [`RoomDirectory`] — the table of live rooms, one lock per room
//! - [`RoomError`] — every way an operation can be refused

mod directory;
mod error;
mod room;

pub use directory::{DisconnectCleanup, RoomDirectory};
pub use error::RoomError;
pub use room::Room;
