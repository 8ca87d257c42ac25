//! # Parlor
//!
//! A connection-oriented chat/room messaging server. Clients hold a
//! persistent WebSocket connection, authenticate against an external
//! account backend, discover users and rooms, exchange direct and
//! room-scoped messages, and manage room membership (join, ban, approve,
//! lock). Large lists travel as paged transfers reassembled by key.
//!
//! The layers compose bottom-up — transport → protocol → session → room —
//! and this crate ties them together: the dispatcher routes typed
//! commands under authentication preconditions, the broadcast engine
//! fans messages out on membership snapshots, and a single typed event
//! channel reports everything to the embedding application.
//!
//! ```rust,ignore
//! let (events, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
//! let server = Server::builder()
//!     .bind("0.0.0.0:8080")
//!     .max_connections(1024)
//!     .events(events)
//!     .build(my_account_backend)
//!     .await?;
//! server.run().await
//! ```

mod broadcast;
mod dispatcher;
mod error;
mod events;
mod server;

pub use error::ServerError;
pub use events::{EventSink, ServerEvent};
pub use server::{Server, ServerBuilder, ServerConfig, ShutdownHandle};

pub use parlor_protocol as protocol;
pub use parlor_room as room;
pub use parlor_session as session;
pub use parlor_transport as transport;
