//! The closed enumeration of wire message kinds.
//!
//! Every frame starts with a kind token. The kind fixes three things the
//! rest of the protocol layer relies on:
//!
//! - **field count** — how many fields follow the token, which is what lets
//!   the codec split exactly N−1 leading fields and keep the remainder (the
//!   trailing field, separators and all) verbatim;
//! - **origin** — whether the kind travels client→server or server→client;
//! - **auth requirement** — whether a client may send it before
//!   authenticating.
//!
//! The dispatcher matches on this enum exhaustively; an unknown token never
//! becomes a kind, it becomes [`ProtocolError::UnknownKind`](crate::ProtocolError).

use std::fmt;

/// Which side of the connection emits a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Sent by clients, handled by the server dispatcher.
    Client,
    /// Sent by the server, handled by clients.
    Server,
}

/// A wire message kind.
///
/// Tokens keep the spelling of the original protocol (including
/// `RECIEVEMESSAGE`); deployed clients parse these strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // -- Auth --
    /// Client: authenticate with username and secret.
    Authenticate,
    /// Server: authentication outcome status.
    Auth,
    /// Client: ask for the guid bound to this connection. Also serves as a
    /// liveness probe and is allowed before authentication.
    WhoAmI,
    /// Server: the connection's client guid.
    YourId,

    // -- Directory --
    /// Client: request the connected-user list.
    GetUserList,
    /// Server: connected-user list as a JSON payload.
    UserList,
    /// Client: request the connected-user list as a paged transfer.
    GetUserListPaged,
    /// Server: one page of a paged user list.
    UserListPage,
    /// Client: request the room list.
    GetRoomList,
    /// Server: room list as a JSON payload.
    RoomList,
    /// Client: request the room list as a paged transfer.
    GetRoomListPaged,
    /// Server: one page of a paged room list.
    RoomListPage,

    // -- Room lifecycle --
    /// Client: create a room (capacity, visibility, name).
    CreateRoom,
    /// Server: a room was created; carries the room object.
    RoomCreated,
    /// Client: destroy an owned room.
    DestroyRoom,
    /// Server: a room was destroyed.
    RoomDestroyed,
    /// Client: lock an owned room against new joins.
    LockRoom,
    /// Client: unlock an owned room.
    UnlockRoom,
    /// Server: a room was locked.
    RoomLocked,
    /// Server: a room was unlocked.
    RoomUnlocked,

    // -- Room membership --
    /// Client: add a user (possibly oneself) to a room.
    AddUserToRoom,
    /// Client: remove a user (oneself, or anyone as owner) from a room.
    RemoveUserFromRoom,
    /// Client: ban a user from a room (owner only).
    BanUserFromRoom,
    /// Client: lift a ban (owner only).
    UnbanUserFromRoom,
    /// Client: approve a user for a private room (owner only).
    ApproveUserForRoom,
    /// Client: revoke a private-room approval (owner only).
    UnapproveUserForRoom,
    /// Server: sent to the added user; carries the room object.
    RoomJoined,
    /// Server: a user joined a room (fan-out to members).
    UserJoined,
    /// Server: a user left a room (fan-out to members).
    UserLeft,
    /// Server: a user was banned from a room.
    UserBanned,
    /// Server: a user's ban was lifted.
    UserUnbanned,
    /// Server: a user was approved for a private room.
    UserApproved,
    /// Server: a user's approval was revoked.
    UserUnapproved,
    /// Client: request a room's member list.
    ListUsersInRoom,
    /// Server: a room's member list as JSON.
    RoomUserList,
    /// Client: request a room's member list as a paged transfer.
    ListUsersInRoomPaged,
    /// Server: one page of a paged member list.
    RoomUserListPage,
    /// Client: request a room's ban list.
    ListBannedInRoom,
    /// Server: a room's ban list as JSON.
    RoomBanList,
    /// Client: request a room's ban list as a paged transfer.
    ListBannedInRoomPaged,
    /// Server: one page of a paged ban list.
    RoomBanListPage,
    /// Client: request a room's approved list.
    ListApprovedInRoom,
    /// Server: a room's approved list as JSON.
    RoomApprovedList,
    /// Client: request a room's approved list as a paged transfer.
    ListApprovedInRoomPaged,
    /// Server: one page of a paged approved list.
    RoomApprovedListPage,

    // -- Messaging --
    /// Client: direct message to a username.
    SendToUser,
    /// Server: direct message delivered to this connection.
    ReceiveMessage,
    /// Server: delivery acknowledgment back to the sender.
    MessageDelivered,
    /// Client: broadcast to every authenticated user except the sender.
    SendToAll,
    /// Server: a broadcast message.
    BroadcastMessage,
    /// Client: message to a room.
    SendToRoom,
    /// Server: a room message (fan-out to members).
    RoomMessage,

    // -- Errors --
    /// Server: typed error report (offending kind, taxonomy tag, detail).
    Error,
}

impl MessageKind {
    /// The wire token for this kind.
    pub fn token(self) -> &'static str {
        match self {
            Self::Authenticate => "AUTHENTICATE",
            Self::Auth => "AUTH",
            Self::WhoAmI => "GETMYID",
            Self::YourId => "IDIS",
            Self::GetUserList => "GETUSERLIST",
            Self::UserList => "USERLIST",
            Self::GetUserListPaged => "GETUSERLIST*PAGED",
            Self::UserListPage => "USERLIST*PAGE",
            Self::GetRoomList => "GETROOMLIST",
            Self::RoomList => "ROOMLIST",
            Self::GetRoomListPaged => "GETROOMLIST*PAGED",
            Self::RoomListPage => "ROOMLIST*PAGE",
            Self::CreateRoom => "CREATEROOM",
            Self::RoomCreated => "ROOMCREATED",
            Self::DestroyRoom => "DESTROYROOM",
            Self::RoomDestroyed => "ROOMDESTROYED",
            Self::LockRoom => "LOCKROOM",
            Self::UnlockRoom => "UNLOCKROOM",
            Self::RoomLocked => "ROOMLOCKED",
            Self::RoomUnlocked => "ROOMUNLOCKED",
            Self::AddUserToRoom => "ADDUSERTOROOM",
            Self::RemoveUserFromRoom => "REMOVEUSERFROMROOM",
            Self::BanUserFromRoom => "BANUSERFROMROOM",
            Self::UnbanUserFromRoom => "UNBANUSERFROMROOM",
            Self::ApproveUserForRoom => "APPROVEUSERROOM",
            Self::UnapproveUserForRoom => "UNAPPROVEUSERROOM",
            Self::RoomJoined => "ROOMJOINED",
            Self::UserJoined => "USERJOINED",
            Self::UserLeft => "USERLEFT",
            Self::UserBanned => "USERBANNED",
            Self::UserUnbanned => "USERUNBANNED",
            Self::UserApproved => "USERAPPROVED",
            Self::UserUnapproved => "USERUNAPPROVED",
            Self::ListUsersInRoom => "LISTUSERSINROOM",
            Self::RoomUserList => "ROOMUSERLIST",
            Self::ListUsersInRoomPaged => "LISTUSERSINROOM*PAGED",
            Self::RoomUserListPage => "ROOMUSERLIST*PAGE",
            Self::ListBannedInRoom => "LISTBANNEDINROOM",
            Self::RoomBanList => "ROOMBANLIST",
            Self::ListBannedInRoomPaged => "LISTBANNEDINROOM*PAGED",
            Self::RoomBanListPage => "ROOMBANLIST*PAGE",
            Self::ListApprovedInRoom => "LISTAPPROVEDINROOM",
            Self::RoomApprovedList => "ROOMAPPROVEDLIST",
            Self::ListApprovedInRoomPaged => "LISTAPPROVEDINROOM*PAGED",
            Self::RoomApprovedListPage => "ROOMAPPROVEDLIST*PAGE",
            Self::SendToUser => "SENDMESGTOUSER",
            Self::ReceiveMessage => "RECIEVEMESSAGE",
            Self::MessageDelivered => "MESGDELIVERED",
            Self::SendToAll => "SENDMESGTOALL",
            Self::BroadcastMessage => "BROADCASTMSG",
            Self::SendToRoom => "SENDMSGTOROOM",
            Self::RoomMessage => "ROOMMSG",
            Self::Error => "ERROR",
        }
    }

    /// Looks up a kind by its wire token. `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        ALL_KINDS.iter().copied().find(|k| k.token() == token)
    }

    /// Number of fields that follow the kind token.
    ///
    /// For kinds with at least one field the last field is the trailing
    /// field and may contain the separator.
    pub fn field_count(self) -> usize {
        match self {
            Self::WhoAmI
            | Self::GetUserList
            | Self::GetUserListPaged
            | Self::GetRoomList
            | Self::GetRoomListPaged => 0,

            Self::Auth
            | Self::YourId
            | Self::UserList
            | Self::RoomList
            | Self::RoomCreated
            | Self::RoomJoined
            | Self::DestroyRoom
            | Self::RoomDestroyed
            | Self::LockRoom
            | Self::UnlockRoom
            | Self::RoomLocked
            | Self::RoomUnlocked
            | Self::ListUsersInRoom
            | Self::ListUsersInRoomPaged
            | Self::ListBannedInRoom
            | Self::ListBannedInRoomPaged
            | Self::ListApprovedInRoom
            | Self::ListApprovedInRoomPaged
            | Self::MessageDelivered
            | Self::SendToAll => 1,

            Self::Authenticate
            | Self::SendToUser
            | Self::ReceiveMessage
            | Self::BroadcastMessage
            | Self::SendToRoom
            | Self::AddUserToRoom
            | Self::RemoveUserFromRoom
            | Self::BanUserFromRoom
            | Self::UnbanUserFromRoom
            | Self::ApproveUserForRoom
            | Self::UnapproveUserForRoom
            | Self::UserJoined
            | Self::UserLeft
            | Self::UserBanned
            | Self::UserUnbanned
            | Self::UserApproved
            | Self::UserUnapproved
            | Self::RoomUserList
            | Self::RoomBanList
            | Self::RoomApprovedList => 2,

            Self::CreateRoom
            | Self::UserListPage
            | Self::RoomListPage
            | Self::RoomMessage
            | Self::Error => 3,

            Self::RoomUserListPage
            | Self::RoomBanListPage
            | Self::RoomApprovedListPage => 4,
        }
    }

    /// Which side of the connection emits this kind.
    pub fn origin(self) -> Origin {
        match self {
            Self::Authenticate
            | Self::WhoAmI
            | Self::GetUserList
            | Self::GetUserListPaged
            | Self::GetRoomList
            | Self::GetRoomListPaged
            | Self::CreateRoom
            | Self::DestroyRoom
            | Self::LockRoom
            | Self::UnlockRoom
            | Self::AddUserToRoom
            | Self::RemoveUserFromRoom
            | Self::BanUserFromRoom
            | Self::UnbanUserFromRoom
            | Self::ApproveUserForRoom
            | Self::UnapproveUserForRoom
            | Self::ListUsersInRoom
            | Self::ListUsersInRoomPaged
            | Self::ListBannedInRoom
            | Self::ListBannedInRoomPaged
            | Self::ListApprovedInRoom
            | Self::ListApprovedInRoomPaged
            | Self::SendToUser
            | Self::SendToAll
            | Self::SendToRoom => Origin::Client,

            _ => Origin::Server,
        }
    }

    /// Whether a client must be authenticated to send this kind.
    ///
    /// Only meaningful for client-origin kinds: authentication itself and
    /// the identity probe pass, everything else requires a bound user.
    pub fn requires_auth(self) -> bool {
        !matches!(self, Self::Authenticate | Self::WhoAmI)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Every kind, in declaration order. Used for token lookup and by tests
/// that sweep the whole table.
pub const ALL_KINDS: &[MessageKind] = &[
    MessageKind::Authenticate,
    MessageKind::Auth,
    MessageKind::WhoAmI,
    MessageKind::YourId,
    MessageKind::GetUserList,
    MessageKind::UserList,
    MessageKind::GetUserListPaged,
    MessageKind::UserListPage,
    MessageKind::GetRoomList,
    MessageKind::RoomList,
    MessageKind::GetRoomListPaged,
    MessageKind::RoomListPage,
    MessageKind::CreateRoom,
    MessageKind::RoomCreated,
    MessageKind::DestroyRoom,
    MessageKind::RoomDestroyed,
    MessageKind::LockRoom,
    MessageKind::UnlockRoom,
    MessageKind::RoomLocked,
    MessageKind::RoomUnlocked,
    MessageKind::AddUserToRoom,
    MessageKind::RemoveUserFromRoom,
    MessageKind::BanUserFromRoom,
    MessageKind::UnbanUserFromRoom,
    MessageKind::ApproveUserForRoom,
    MessageKind::UnapproveUserForRoom,
    MessageKind::RoomJoined,
    MessageKind::UserJoined,
    MessageKind::UserLeft,
    MessageKind::UserBanned,
    MessageKind::UserUnbanned,
    MessageKind::UserApproved,
    MessageKind::UserUnapproved,
    MessageKind::ListUsersInRoom,
    MessageKind::RoomUserList,
    MessageKind::ListUsersInRoomPaged,
    MessageKind::RoomUserListPage,
    MessageKind::ListBannedInRoom,
    MessageKind::RoomBanList,
    MessageKind::ListBannedInRoomPaged,
    MessageKind::RoomBanListPage,
    MessageKind::ListApprovedInRoom,
    MessageKind::RoomApprovedList,
    MessageKind::ListApprovedInRoomPaged,
    MessageKind::RoomApprovedListPage,
    MessageKind::SendToUser,
    MessageKind::ReceiveMessage,
    MessageKind::MessageDelivered,
    MessageKind::SendToAll,
    MessageKind::BroadcastMessage,
    MessageKind::SendToRoom,
    MessageKind::RoomMessage,
    MessageKind::Error,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trips_for_every_kind() {
        for kind in ALL_KINDS {
            assert_eq!(
                MessageKind::from_token(kind.token()),
                Some(*kind),
                "token {} must map back to its kind",
                kind.token()
            );
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        for (i, a) in ALL_KINDS.iter().enumerate() {
            for b in &ALL_KINDS[i + 1..] {
                assert_ne!(a.token(), b.token());
            }
        }
    }

    #[test]
    fn test_from_token_unknown_returns_none() {
        assert_eq!(MessageKind::from_token("FLYTOMOON"), None);
        assert_eq!(MessageKind::from_token(""), None);
        // Token matching is exact, not case-insensitive.
        assert_eq!(MessageKind::from_token("authenticate"), None);
    }

    #[test]
    fn test_pre_auth_kinds() {
        assert!(!MessageKind::Authenticate.requires_auth());
        assert!(!MessageKind::WhoAmI.requires_auth());
        assert!(MessageKind::CreateRoom.requires_auth());
        assert!(MessageKind::GetUserList.requires_auth());
        assert!(MessageKind::SendToUser.requires_auth());
    }

    #[test]
    fn test_paged_responses_carry_page_and_last_fields() {
        // page index + is-last + items on top of any scoping fields.
        assert_eq!(MessageKind::UserListPage.field_count(), 3);
        assert_eq!(MessageKind::RoomListPage.field_count(), 3);
        assert_eq!(MessageKind::RoomUserListPage.field_count(), 4);
        assert_eq!(MessageKind::RoomBanListPage.field_count(), 4);
        assert_eq!(MessageKind::RoomApprovedListPage.field_count(), 4);
    }

    #[test]
    fn test_display_matches_token() {
        assert_eq!(MessageKind::SendToUser.to_string(), "SENDMESGTOUSER");
        assert_eq!(MessageKind::Error.to_string(), "ERROR");
    }
}
