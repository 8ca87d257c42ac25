//! The server's outbound event channel.
//!
//! Everything the embedding application might want to observe arrives as
//! one [`ServerEvent`] on one channel — a consumer matches on the enum
//! instead of registering a separate callback per notification kind.
//! Delivery is best-effort: if no receiver is installed (or it was
//! dropped), events are discarded.

use parlor_protocol::{ClientId, RoomId, RoomInfo, UserInfo};
use tokio::sync::mpsc;

/// A notification from the server core to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A connection registered and got its client guid.
    ClientConnected { client: ClientId },
    /// A connection went away; `username` is set if it was authenticated.
    ClientDisconnected {
        client: ClientId,
        username: Option<String>,
    },
    /// AUTHENTICATE succeeded.
    UserAuthenticated { user: UserInfo },
    /// A room was created (owner already inside).
    RoomCreated { room: RoomInfo },
    /// A room was destroyed, explicitly or by owner disconnect.
    RoomDestroyed { room: RoomId },
    /// A room was locked against joins.
    RoomLocked { room: RoomId },
    /// A room was unlocked.
    RoomUnlocked { room: RoomId },
    /// A user joined a room.
    MemberJoined { room: RoomId, user: UserInfo },
    /// A user left a room (voluntarily, kicked, or by disconnect).
    MemberLeft { room: RoomId, user: UserInfo },
    /// A user was banned from a room.
    UserBanned { room: RoomId, user: UserInfo },
    /// A ban was lifted.
    UserUnbanned { room: RoomId, user: UserInfo },
    /// A user was approved for a private room.
    UserApproved { room: RoomId, user: UserInfo },
    /// An approval was revoked.
    UserUnapproved { room: RoomId, user: UserInfo },
    /// A direct message was delivered.
    DirectMessage {
        from: UserInfo,
        to: UserInfo,
        message: String,
    },
    /// A message was fanned out to a room.
    RoomMessage {
        room: RoomId,
        from: UserInfo,
        message: String,
    },
    /// A message was broadcast to everyone but the sender.
    Broadcast { from: UserInfo, message: String },
}

/// Best-effort sender for [`ServerEvent`]s.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ServerEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A sink feeding the given channel.
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emits an event. Dropped receivers are ignored.
    pub fn emit(&self, event: ServerEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
