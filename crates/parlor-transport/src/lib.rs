//! Transport layer for Parlor.
//!
//! The core never touches sockets. It sees the [`Transport`] trait (accept
//! connections) and the [`Connection`] trait (exchange text frames, close
//! with a reason). TLS termination and listener setup live behind these
//! traits, outside the protocol engine.
//!
//! Frames are text: the wire format is line-oriented, and a connection's
//! read side may be parked on [`Connection::recv`] indefinitely while the
//! write side keeps delivering — implementations must not serialize reads
//! and writes against each other.

#![allow(async_fn_in_trait)]

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier assigned to each accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    async fn accept(
        &mut self,
    ) -> Result<Self::Connection, TransportError>;
}

/// A single connection exchanging text frames with a peer.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the peer.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Suspends until the next frame (or close) arrives.
    ///
    /// Returns `Ok(None)` when the peer closed the connection. May be
    /// called concurrently with [`send`](Self::send) — a parked read never
    /// blocks a write.
    async fn recv(&self) -> Result<Option<String>, TransportError>;

    /// Closes the connection, telling the peer why.
    async fn close(&self, reason: &str) -> Result<(), TransportError>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
