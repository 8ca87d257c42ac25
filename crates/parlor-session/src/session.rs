//! Session types: the server's record of one live connection.

use parlor_protocol::{ClientId, TransferKey, UserInfo};
use parlor_transport::ConnectionId;
use tokio::sync::mpsc;

/// One encoded frame queued for a connection's writer task.
///
/// Writes to a connection are serialized by routing every outbound frame
/// through one queue per connection; the writer task drains it, so at most
/// one write is in flight per socket no matter how many components fan out
/// to it concurrently.
#[derive(Debug)]
pub struct OutboundMessage {
    /// The encoded wire frame.
    pub frame: String,
    /// Set on the terminal page of a paged transfer. The writer task
    /// closes the open-transfer entry once this frame has actually been
    /// written, not when it was merely queued.
    pub ends_transfer: Option<TransferKey>,
}

impl OutboundMessage {
    pub fn frame(frame: String) -> Self {
        Self {
            frame,
            ends_transfer: None,
        }
    }
}

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::UnboundedSender<OutboundMessage>;

/// An authenticated identity bound to a session.
///
/// User records are scoped to the authenticated lifetime: they are created
/// when AUTHENTICATE succeeds and dropped when the session unregisters.
/// The guid is the session's client guid, so the identity a client learns
/// from `IDIS` before authenticating stays valid afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: ClientId,
    pub username: String,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// A live connection and its (optional) bound user.
#[derive(Debug)]
pub struct Session {
    /// The guid assigned at registration.
    pub id: ClientId,
    /// The transport connection this session rides on.
    pub connection: ConnectionId,
    /// Bound user; `None` until AUTHENTICATE succeeds.
    pub user: Option<User>,
    /// Handle to the connection's outbound queue.
    pub outbound: OutboundSender,
}

impl Session {
    /// Whether AUTHENTICATE has succeeded on this session.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The bound username, if any.
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}
