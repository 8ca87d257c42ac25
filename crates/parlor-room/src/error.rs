//! Error types for the room layer.

use parlor_protocol::{ClientId, RoomId};

/// Errors that can occur during room operations.
///
/// Every variant corresponds to a refused operation; a refusal never
/// leaves a room partially modified.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room is at capacity.
    #[error("room {0} is full")]
    Full(RoomId),

    /// The user is banned from the room.
    #[error("user {user} is banned from room {room}")]
    Banned { user: ClientId, room: RoomId },

    /// The room is locked against new joins.
    #[error("room {0} is locked")]
    Locked(RoomId),

    /// The room is private and the user is not on its approved list.
    #[error("user {user} is not approved for private room {room}")]
    NotApproved { user: ClientId, room: RoomId },

    /// The user is already a member.
    #[error("user {user} is already in room {room}")]
    AlreadyMember { user: ClientId, room: RoomId },

    /// The user is not a member.
    #[error("user {user} is not in room {room}")]
    NotMember { user: ClientId, room: RoomId },

    /// The user is a member but may not act on this room (message from
    /// outside, kick by a non-owner).
    #[error("user {user} may not act on room {room}")]
    OutsideRoom { user: ClientId, room: RoomId },

    /// An owner-only operation was attempted by someone else.
    #[error("user {user} is not the owner of room {room}")]
    NotOwner { user: ClientId, room: RoomId },

    /// The owner cannot be removed or banned; a room never loses its
    /// owner while it exists.
    #[error("the owner of room {0} cannot be removed or banned")]
    OwnerProtected(RoomId),

    /// Lifting a ban that does not exist.
    #[error("user {user} is not banned from room {room}")]
    NotBanned { user: ClientId, room: RoomId },

    /// Revoking an approval that does not exist.
    #[error("user {user} has no approval for room {room}")]
    NoApproval { user: ClientId, room: RoomId },
}
