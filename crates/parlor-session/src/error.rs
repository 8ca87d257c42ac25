//! Error types for the session layer.

use parlor_protocol::ClientId;

/// Errors that can occur during session management and authentication.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The account backend rejected the credentials, or the username is
    /// not usable on the wire.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The connection has not authenticated and the operation requires a
    /// bound user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The username already has a live session (here or on another
    /// connection). The existing binding stays; the new attempt loses.
    #[error("user {0} is already authenticated")]
    AlreadyAuthenticated(String),

    /// No session exists for the given client id.
    #[error("no session for client {0}")]
    NotFound(ClientId),

    /// The named user has no live session — direct delivery is impossible
    /// because there is no queue for offline users.
    #[error("user {0} is not connected")]
    UserOffline(String),
}
