//! Typed protocol surface: identifiers, payload objects, and the two
//! closed sum types (`ClientCommand`, `ServerMessage`) that frames decode
//! into.
//!
//! The codec layer ([`Frame`]) only knows kinds and string fields. This
//! module gives every kind its typed shape and the conversions in both
//! directions, so the dispatcher matches on real types and field parsing
//! failures surface as [`ProtocolError::InvalidField`] instead of panics.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::paginate::Page;
use crate::{Frame, MessageKind, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A client's guid. Assigned when the connection registers and, once the
/// client authenticates, doubling as the bound user's identity for the
/// lifetime of the binding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Generates a fresh unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A room's guid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub Uuid);

impl RoomId {
    /// Generates a fresh unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Payload objects
// ---------------------------------------------------------------------------

/// Room visibility. Private rooms admit only approved users.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn token(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "PUBLIC" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A connected, authenticated user as it appears in list payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: ClientId,
    pub username: String,
}

/// A room as it appears in list payloads and join confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub owner: ClientId,
    pub capacity: usize,
    pub visibility: Visibility,
    pub locked: bool,
    pub members: usize,
}

/// Wire tag identifying the error class in an `ERROR` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    Protocol,
    Auth,
    NotFound,
    Capacity,
    Permission,
    Banned,
    TransferConflict,
}

impl ErrorTag {
    pub fn token(self) -> &'static str {
        match self {
            Self::Protocol => "PROTOCOL",
            Self::Auth => "AUTH",
            Self::NotFound => "NOTFOUND",
            Self::Capacity => "CAPACITY",
            Self::Permission => "PERMISSION",
            Self::Banned => "BANNED",
            Self::TransferConflict => "TRANSFERCONFLICT",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "PROTOCOL" => Some(Self::Protocol),
            "AUTH" => Some(Self::Auth),
            "NOTFOUND" => Some(Self::NotFound),
            "CAPACITY" => Some(Self::Capacity),
            "PERMISSION" => Some(Self::Permission),
            "BANNED" => Some(Self::Banned),
            "TRANSFERCONFLICT" => Some(Self::TransferConflict),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Whether a string can serve as a username: non-empty and free of the
/// frame separator, since usernames ride in non-trailing fields.
pub fn valid_username(name: &str) -> bool {
    !name.is_empty() && !name.contains(crate::SEPARATOR)
}

// ---------------------------------------------------------------------------
// Field parsing helpers
// ---------------------------------------------------------------------------

/// Consumes a frame's fields left to right, reporting the field index in
/// every parse error.
struct FieldReader {
    kind: MessageKind,
    fields: std::vec::IntoIter<String>,
    index: usize,
}

impl FieldReader {
    fn new(frame: Frame) -> Self {
        Self {
            kind: frame.kind,
            fields: frame.fields.into_iter(),
            index: 0,
        }
    }

    fn next(&mut self) -> Result<String, ProtocolError> {
        let index = self.index;
        self.index += 1;
        // The codec already checked the field count; a short frame here is
        // a frame that never went through `Frame::decode`.
        self.fields.next().ok_or(ProtocolError::FieldCount {
            kind: self.kind,
            expected: self.kind.field_count(),
            got: index,
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::InvalidField {
            kind: self.kind,
            index: self.index - 1,
            reason: reason.into(),
        }
    }

    fn uuid(&mut self) -> Result<Uuid, ProtocolError> {
        let raw = self.next()?;
        Uuid::parse_str(&raw).map_err(|_| self.invalid("not a guid"))
    }

    fn room(&mut self) -> Result<RoomId, ProtocolError> {
        self.uuid().map(RoomId)
    }

    fn client(&mut self) -> Result<ClientId, ProtocolError> {
        self.uuid().map(ClientId)
    }

    fn capacity(&mut self) -> Result<NonZeroUsize, ProtocolError> {
        let raw = self.next()?;
        let n: usize = raw
            .parse()
            .map_err(|_| self.invalid("capacity is not a number"))?;
        NonZeroUsize::new(n)
            .ok_or_else(|| self.invalid("capacity must be at least 1"))
    }

    fn visibility(&mut self) -> Result<Visibility, ProtocolError> {
        let raw = self.next()?;
        Visibility::from_token(&raw)
            .ok_or_else(|| self.invalid("expected PUBLIC or PRIVATE"))
    }

    fn page_index(&mut self) -> Result<u32, ProtocolError> {
        let raw = self.next()?;
        raw.parse()
            .map_err(|_| self.invalid("page index is not a number"))
    }

    fn flag(&mut self) -> Result<bool, ProtocolError> {
        let raw = self.next()?;
        match raw.as_str() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(self.invalid("expected 0 or 1")),
        }
    }

    fn json<T: for<'de> Deserialize<'de>>(
        &mut self,
    ) -> Result<T, ProtocolError> {
        let raw = self.next()?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reads the page triple shared by every `*PAGE` kind: index,
    /// terminal flag, and the items as a JSON array of strings.
    fn page(&mut self) -> Result<Page, ProtocolError> {
        let index = self.page_index()?;
        let is_last = self.flag()?;
        let items: Vec<String> = self.json()?;
        Ok(Page {
            index,
            is_last,
            items,
        })
    }
}

fn flag_field(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn json_field<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}

fn page_fields(page: &Page) -> Result<Vec<String>, ProtocolError> {
    Ok(vec![
        page.index.to_string(),
        flag_field(page.is_last),
        json_field(&page.items)?,
    ])
}

// ---------------------------------------------------------------------------
// ClientCommand
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do. One variant per
/// client-origin kind; the dispatcher matches this exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Authenticate { username: String, secret: String },
    WhoAmI,
    GetUserList,
    GetUserListPaged,
    GetRoomList,
    GetRoomListPaged,
    SendToUser { to: String, message: String },
    SendToAll { message: String },
    SendToRoom { room: RoomId, message: String },
    CreateRoom {
        capacity: NonZeroUsize,
        visibility: Visibility,
        name: String,
    },
    DestroyRoom { room: RoomId },
    LockRoom { room: RoomId },
    UnlockRoom { room: RoomId },
    AddUserToRoom { username: String, room: RoomId },
    RemoveUserFromRoom { username: String, room: RoomId },
    BanUserFromRoom { username: String, room: RoomId },
    UnbanUserFromRoom { username: String, room: RoomId },
    ApproveUserForRoom { username: String, room: RoomId },
    UnapproveUserForRoom { username: String, room: RoomId },
    ListUsersInRoom { room: RoomId },
    ListUsersInRoomPaged { room: RoomId },
    ListBannedInRoom { room: RoomId },
    ListBannedInRoomPaged { room: RoomId },
    ListApprovedInRoom { room: RoomId },
    ListApprovedInRoomPaged { room: RoomId },
}

impl ClientCommand {
    /// The wire kind this command travels as.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Authenticate { .. } => MessageKind::Authenticate,
            Self::WhoAmI => MessageKind::WhoAmI,
            Self::GetUserList => MessageKind::GetUserList,
            Self::GetUserListPaged => MessageKind::GetUserListPaged,
            Self::GetRoomList => MessageKind::GetRoomList,
            Self::GetRoomListPaged => MessageKind::GetRoomListPaged,
            Self::SendToUser { .. } => MessageKind::SendToUser,
            Self::SendToAll { .. } => MessageKind::SendToAll,
            Self::SendToRoom { .. } => MessageKind::SendToRoom,
            Self::CreateRoom { .. } => MessageKind::CreateRoom,
            Self::DestroyRoom { .. } => MessageKind::DestroyRoom,
            Self::LockRoom { .. } => MessageKind::LockRoom,
            Self::UnlockRoom { .. } => MessageKind::UnlockRoom,
            Self::AddUserToRoom { .. } => MessageKind::AddUserToRoom,
            Self::RemoveUserFromRoom { .. } => {
                MessageKind::RemoveUserFromRoom
            }
            Self::BanUserFromRoom { .. } => MessageKind::BanUserFromRoom,
            Self::UnbanUserFromRoom { .. } => {
                MessageKind::UnbanUserFromRoom
            }
            Self::ApproveUserForRoom { .. } => {
                MessageKind::ApproveUserForRoom
            }
            Self::UnapproveUserForRoom { .. } => {
                MessageKind::UnapproveUserForRoom
            }
            Self::ListUsersInRoom { .. } => MessageKind::ListUsersInRoom,
            Self::ListUsersInRoomPaged { .. } => {
                MessageKind::ListUsersInRoomPaged
            }
            Self::ListBannedInRoom { .. } => MessageKind::ListBannedInRoom,
            Self::ListBannedInRoomPaged { .. } => {
                MessageKind::ListBannedInRoomPaged
            }
            Self::ListApprovedInRoom { .. } => {
                MessageKind::ListApprovedInRoom
            }
            Self::ListApprovedInRoomPaged { .. } => {
                MessageKind::ListApprovedInRoomPaged
            }
        }
    }

    /// Parses a decoded frame into a typed command.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedKind`] for server-origin kinds;
    /// [`ProtocolError::InvalidField`] for fields that fail to parse.
    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        use MessageKind as K;

        let kind = frame.kind;
        let mut r = FieldReader::new(frame);
        let cmd = match kind {
            K::Authenticate => Self::Authenticate {
                username: r.next()?,
                secret: r.next()?,
            },
            K::WhoAmI => Self::WhoAmI,
            K::GetUserList => Self::GetUserList,
            K::GetUserListPaged => Self::GetUserListPaged,
            K::GetRoomList => Self::GetRoomList,
            K::GetRoomListPaged => Self::GetRoomListPaged,
            K::SendToUser => Self::SendToUser {
                to: r.next()?,
                message: r.next()?,
            },
            K::SendToAll => Self::SendToAll { message: r.next()? },
            K::SendToRoom => Self::SendToRoom {
                room: r.room()?,
                message: r.next()?,
            },
            K::CreateRoom => Self::CreateRoom {
                capacity: r.capacity()?,
                visibility: r.visibility()?,
                name: r.next()?,
            },
            K::DestroyRoom => Self::DestroyRoom { room: r.room()? },
            K::LockRoom => Self::LockRoom { room: r.room()? },
            K::UnlockRoom => Self::UnlockRoom { room: r.room()? },
            K::AddUserToRoom => Self::AddUserToRoom {
                username: r.next()?,
                room: r.room()?,
            },
            K::RemoveUserFromRoom => Self::RemoveUserFromRoom {
                username: r.next()?,
                room: r.room()?,
            },
            K::BanUserFromRoom => Self::BanUserFromRoom {
                username: r.next()?,
                room: r.room()?,
            },
            K::UnbanUserFromRoom => Self::UnbanUserFromRoom {
                username: r.next()?,
                room: r.room()?,
            },
            K::ApproveUserForRoom => Self::ApproveUserForRoom {
                username: r.next()?,
                room: r.room()?,
            },
            K::UnapproveUserForRoom => Self::UnapproveUserForRoom {
                username: r.next()?,
                room: r.room()?,
            },
            K::ListUsersInRoom => {
                Self::ListUsersInRoom { room: r.room()? }
            }
            K::ListUsersInRoomPaged => {
                Self::ListUsersInRoomPaged { room: r.room()? }
            }
            K::ListBannedInRoom => {
                Self::ListBannedInRoom { room: r.room()? }
            }
            K::ListBannedInRoomPaged => {
                Self::ListBannedInRoomPaged { room: r.room()? }
            }
            K::ListApprovedInRoom => {
                Self::ListApprovedInRoom { room: r.room()? }
            }
            K::ListApprovedInRoomPaged => {
                Self::ListApprovedInRoomPaged { room: r.room()? }
            }
            // Every remaining kind is server-origin.
            other => return Err(ProtocolError::UnexpectedKind(other)),
        };
        Ok(cmd)
    }

    /// Builds the frame for this command (the client side of the wire).
    pub fn to_frame(&self) -> Frame {
        let kind = self.kind();
        let fields = match self {
            Self::Authenticate { username, secret } => {
                vec![username.clone(), secret.clone()]
            }
            Self::WhoAmI
            | Self::GetUserList
            | Self::GetUserListPaged
            | Self::GetRoomList
            | Self::GetRoomListPaged => Vec::new(),
            Self::SendToUser { to, message } => {
                vec![to.clone(), message.clone()]
            }
            Self::SendToAll { message } => vec![message.clone()],
            Self::SendToRoom { room, message } => {
                vec![room.to_string(), message.clone()]
            }
            Self::CreateRoom {
                capacity,
                visibility,
                name,
            } => vec![
                capacity.to_string(),
                visibility.token().to_string(),
                name.clone(),
            ],
            Self::DestroyRoom { room }
            | Self::LockRoom { room }
            | Self::UnlockRoom { room }
            | Self::ListUsersInRoom { room }
            | Self::ListUsersInRoomPaged { room }
            | Self::ListBannedInRoom { room }
            | Self::ListBannedInRoomPaged { room }
            | Self::ListApprovedInRoom { room }
            | Self::ListApprovedInRoomPaged { room } => {
                vec![room.to_string()]
            }
            Self::AddUserToRoom { username, room }
            | Self::RemoveUserFromRoom { username, room }
            | Self::BanUserFromRoom { username, room }
            | Self::UnbanUserFromRoom { username, room }
            | Self::ApproveUserForRoom { username, room }
            | Self::UnapproveUserForRoom { username, room } => {
                vec![username.clone(), room.to_string()]
            }
        };
        Frame::new(kind, fields)
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Everything the server can tell a client. One variant per server-origin
/// kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Auth { status: String },
    YourId { id: ClientId },
    UserList { users: Vec<UserInfo> },
    UserListPage { page: Page },
    RoomList { rooms: Vec<RoomInfo> },
    RoomListPage { page: Page },
    ReceiveMessage { from: String, message: String },
    MessageDelivered { to: String },
    BroadcastMessage { from: String, message: String },
    RoomMessage {
        room: RoomId,
        from: String,
        message: String,
    },
    RoomCreated { room: RoomInfo },
    RoomJoined { room: RoomInfo },
    RoomDestroyed { room: RoomId },
    RoomLocked { room: RoomId },
    RoomUnlocked { room: RoomId },
    UserJoined { room: RoomId, username: String },
    UserLeft { room: RoomId, username: String },
    UserBanned { room: RoomId, username: String },
    UserUnbanned { room: RoomId, username: String },
    UserApproved { room: RoomId, username: String },
    UserUnapproved { room: RoomId, username: String },
    RoomUserList {
        room: RoomId,
        users: Vec<UserInfo>,
    },
    RoomUserListPage { room: RoomId, page: Page },
    RoomBanList {
        room: RoomId,
        banned: Vec<ClientId>,
    },
    RoomBanListPage { room: RoomId, page: Page },
    RoomApprovedList {
        room: RoomId,
        approved: Vec<ClientId>,
    },
    RoomApprovedListPage { room: RoomId, page: Page },
    Error {
        /// The kind token of the frame that failed. A token, not a
        /// [`MessageKind`]: the offending frame may have carried a kind
        /// the protocol does not know.
        offending: String,
        tag: ErrorTag,
        detail: String,
    },
}

impl ServerMessage {
    /// The wire kind this message travels as.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Auth { .. } => MessageKind::Auth,
            Self::YourId { .. } => MessageKind::YourId,
            Self::UserList { .. } => MessageKind::UserList,
            Self::UserListPage { .. } => MessageKind::UserListPage,
            Self::RoomList { .. } => MessageKind::RoomList,
            Self::RoomListPage { .. } => MessageKind::RoomListPage,
            Self::ReceiveMessage { .. } => MessageKind::ReceiveMessage,
            Self::MessageDelivered { .. } => MessageKind::MessageDelivered,
            Self::BroadcastMessage { .. } => MessageKind::BroadcastMessage,
            Self::RoomMessage { .. } => MessageKind::RoomMessage,
            Self::RoomCreated { .. } => MessageKind::RoomCreated,
            Self::RoomJoined { .. } => MessageKind::RoomJoined,
            Self::RoomDestroyed { .. } => MessageKind::RoomDestroyed,
            Self::RoomLocked { .. } => MessageKind::RoomLocked,
            Self::RoomUnlocked { .. } => MessageKind::RoomUnlocked,
            Self::UserJoined { .. } => MessageKind::UserJoined,
            Self::UserLeft { .. } => MessageKind::UserLeft,
            Self::UserBanned { .. } => MessageKind::UserBanned,
            Self::UserUnbanned { .. } => MessageKind::UserUnbanned,
            Self::UserApproved { .. } => MessageKind::UserApproved,
            Self::UserUnapproved { .. } => MessageKind::UserUnapproved,
            Self::RoomUserList { .. } => MessageKind::RoomUserList,
            Self::RoomUserListPage { .. } => MessageKind::RoomUserListPage,
            Self::RoomBanList { .. } => MessageKind::RoomBanList,
            Self::RoomBanListPage { .. } => MessageKind::RoomBanListPage,
            Self::RoomApprovedList { .. } => MessageKind::RoomApprovedList,
            Self::RoomApprovedListPage { .. } => {
                MessageKind::RoomApprovedListPage
            }
            Self::Error { .. } => MessageKind::Error,
        }
    }

    /// Builds the frame for this message.
    ///
    /// # Errors
    /// [`ProtocolError::Payload`] if a JSON payload fails to serialize.
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        let kind = self.kind();
        let fields = match self {
            Self::Auth { status } => vec![status.clone()],
            Self::YourId { id } => vec![id.to_string()],
            Self::UserList { users } => vec![json_field(users)?],
            Self::UserListPage { page } => page_fields(page)?,
            Self::RoomList { rooms } => vec![json_field(rooms)?],
            Self::RoomListPage { page } => page_fields(page)?,
            Self::ReceiveMessage { from, message } => {
                vec![from.clone(), message.clone()]
            }
            Self::MessageDelivered { to } => vec![to.clone()],
            Self::BroadcastMessage { from, message } => {
                vec![from.clone(), message.clone()]
            }
            Self::RoomMessage {
                room,
                from,
                message,
            } => vec![room.to_string(), from.clone(), message.clone()],
            Self::RoomCreated { room } | Self::RoomJoined { room } => {
                vec![json_field(room)?]
            }
            Self::RoomDestroyed { room }
            | Self::RoomLocked { room }
            | Self::RoomUnlocked { room } => vec![room.to_string()],
            Self::UserJoined { room, username }
            | Self::UserLeft { room, username }
            | Self::UserBanned { room, username }
            | Self::UserUnbanned { room, username }
            | Self::UserApproved { room, username }
            | Self::UserUnapproved { room, username } => {
                vec![room.to_string(), username.clone()]
            }
            Self::RoomUserList { room, users } => {
                vec![room.to_string(), json_field(users)?]
            }
            Self::RoomBanList { room, banned } => {
                vec![room.to_string(), json_field(banned)?]
            }
            Self::RoomApprovedList { room, approved } => {
                vec![room.to_string(), json_field(approved)?]
            }
            Self::RoomUserListPage { room, page }
            | Self::RoomBanListPage { room, page }
            | Self::RoomApprovedListPage { room, page } => {
                let mut fields = vec![room.to_string()];
                fields.extend(page_fields(page)?);
                fields
            }
            Self::Error {
                offending,
                tag,
                detail,
            } => vec![
                offending.clone(),
                tag.token().to_string(),
                detail.clone(),
            ],
        };
        Ok(Frame::new(kind, fields))
    }

    /// Parses a decoded frame into a typed message (the client side of the
    /// wire).
    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        use MessageKind as K;

        let kind = frame.kind;
        let mut r = FieldReader::new(frame);
        let msg = match kind {
            K::Auth => Self::Auth { status: r.next()? },
            K::YourId => Self::YourId { id: r.client()? },
            K::UserList => Self::UserList { users: r.json()? },
            K::UserListPage => Self::UserListPage { page: r.page()? },
            K::RoomList => Self::RoomList { rooms: r.json()? },
            K::RoomListPage => Self::RoomListPage { page: r.page()? },
            K::ReceiveMessage => Self::ReceiveMessage {
                from: r.next()?,
                message: r.next()?,
            },
            K::MessageDelivered => {
                Self::MessageDelivered { to: r.next()? }
            }
            K::BroadcastMessage => Self::BroadcastMessage {
                from: r.next()?,
                message: r.next()?,
            },
            K::RoomMessage => Self::RoomMessage {
                room: r.room()?,
                from: r.next()?,
                message: r.next()?,
            },
            K::RoomCreated => Self::RoomCreated { room: r.json()? },
            K::RoomJoined => Self::RoomJoined { room: r.json()? },
            K::RoomDestroyed => Self::RoomDestroyed { room: r.room()? },
            K::RoomLocked => Self::RoomLocked { room: r.room()? },
            K::RoomUnlocked => Self::RoomUnlocked { room: r.room()? },
            K::UserJoined => Self::UserJoined {
                room: r.room()?,
                username: r.next()?,
            },
            K::UserLeft => Self::UserLeft {
                room: r.room()?,
                username: r.next()?,
            },
            K::UserBanned => Self::UserBanned {
                room: r.room()?,
                username: r.next()?,
            },
            K::UserUnbanned => Self::UserUnbanned {
                room: r.room()?,
                username: r.next()?,
            },
            K::UserApproved => Self::UserApproved {
                room: r.room()?,
                username: r.next()?,
            },
            K::UserUnapproved => Self::UserUnapproved {
                room: r.room()?,
                username: r.next()?,
            },
            K::RoomUserList => Self::RoomUserList {
                room: r.room()?,
                users: r.json()?,
            },
            K::RoomUserListPage => Self::RoomUserListPage {
                room: r.room()?,
                page: r.page()?,
            },
            K::RoomBanList => Self::RoomBanList {
                room: r.room()?,
                banned: r.json()?,
            },
            K::RoomBanListPage => Self::RoomBanListPage {
                room: r.room()?,
                page: r.page()?,
            },
            K::RoomApprovedList => Self::RoomApprovedList {
                room: r.room()?,
                approved: r.json()?,
            },
            K::RoomApprovedListPage => Self::RoomApprovedListPage {
                room: r.room()?,
                page: r.page()?,
            },
            K::Error => {
                let offending = r.next()?;
                let tag_raw = r.next()?;
                let tag = ErrorTag::from_token(&tag_raw)
                    .ok_or_else(|| r.invalid("unknown error tag"))?;
                Self::Error {
                    offending,
                    tag,
                    detail: r.next()?,
                }
            }
            // Every remaining kind is client-origin.
            other => return Err(ProtocolError::UnexpectedKind(other)),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_info() -> RoomInfo {
        RoomInfo {
            id: RoomId::new(),
            name: "lobby".into(),
            owner: ClientId::new(),
            capacity: 8,
            visibility: Visibility::Public,
            locked: false,
            members: 1,
        }
    }

    // =====================================================================
    // Identity types and payload objects
    // =====================================================================

    #[test]
    fn test_client_id_serializes_as_plain_guid_string() {
        let id = ClientId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_client_ids_are_unique() {
        assert_ne!(ClientId::new(), ClientId::new());
    }

    #[test]
    fn test_visibility_tokens() {
        assert_eq!(Visibility::Public.token(), "PUBLIC");
        assert_eq!(Visibility::from_token("PRIVATE"), Some(Visibility::Private));
        assert_eq!(Visibility::from_token("SECRET"), None);
    }

    #[test]
    fn test_room_info_json_round_trip() {
        let info = room_info();
        let json = serde_json::to_string(&info).expect("serialize");
        // Visibility uses the wire token inside JSON as well.
        assert!(json.contains("\"PUBLIC\""));
        let back: RoomInfo = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, info);
    }

    #[test]
    fn test_error_tag_tokens_round_trip() {
        for tag in [
            ErrorTag::Protocol,
            ErrorTag::Auth,
            ErrorTag::NotFound,
            ErrorTag::Capacity,
            ErrorTag::Permission,
            ErrorTag::Banned,
            ErrorTag::TransferConflict,
        ] {
            assert_eq!(ErrorTag::from_token(tag.token()), Some(tag));
        }
    }

    #[test]
    fn test_valid_username() {
        assert!(valid_username("alice"));
        assert!(!valid_username(""));
        assert!(!valid_username("ali:ce"));
    }

    // =====================================================================
    // ClientCommand
    // =====================================================================

    #[test]
    fn test_client_command_authenticate_round_trip() {
        let cmd = ClientCommand::Authenticate {
            username: "alice".into(),
            secret: "hunter:2".into(), // secret is trailing, may hold ':'
        };
        let wire = cmd.to_frame().encode().expect("encode");
        let back = ClientCommand::from_frame(
            Frame::decode(&wire).expect("decode"),
        )
        .expect("typed parse");
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_client_command_create_room_round_trip() {
        let cmd = ClientCommand::CreateRoom {
            capacity: NonZeroUsize::new(4).expect("non-zero"),
            visibility: Visibility::Private,
            name: "war:room".into(),
        };
        let wire = cmd.to_frame().encode().expect("encode");
        assert!(wire.starts_with("CREATEROOM:4:PRIVATE:"));
        let back = ClientCommand::from_frame(
            Frame::decode(&wire).expect("decode"),
        )
        .expect("typed parse");
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_client_command_room_scoped_round_trip() {
        let room = RoomId::new();
        let cmd = ClientCommand::BanUserFromRoom {
            username: "mallory".into(),
            room,
        };
        let wire = cmd.to_frame().encode().expect("encode");
        let back = ClientCommand::from_frame(
            Frame::decode(&wire).expect("decode"),
        )
        .expect("typed parse");
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_client_command_rejects_zero_capacity() {
        let frame = Frame::decode("CREATEROOM:0:PUBLIC:lobby")
            .expect("frame decodes");
        assert!(matches!(
            ClientCommand::from_frame(frame),
            Err(ProtocolError::InvalidField { index: 0, .. })
        ));
    }

    #[test]
    fn test_client_command_rejects_bad_visibility() {
        let frame = Frame::decode("CREATEROOM:4:SECRET:lobby")
            .expect("frame decodes");
        assert!(matches!(
            ClientCommand::from_frame(frame),
            Err(ProtocolError::InvalidField { index: 1, .. })
        ));
    }

    #[test]
    fn test_client_command_rejects_bad_room_guid() {
        let frame =
            Frame::decode("DESTROYROOM:not-a-guid").expect("frame decodes");
        assert!(matches!(
            ClientCommand::from_frame(frame),
            Err(ProtocolError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_client_command_rejects_server_origin_kind() {
        let frame = Frame::decode("IDIS:00000000-0000-0000-0000-000000000000")
            .expect("frame decodes");
        assert!(matches!(
            ClientCommand::from_frame(frame),
            Err(ProtocolError::UnexpectedKind(MessageKind::YourId))
        ));
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    fn server_round_trip(msg: ServerMessage) {
        let wire = msg
            .to_frame()
            .expect("to_frame")
            .encode()
            .expect("encode");
        let back = ServerMessage::from_frame(
            Frame::decode(&wire).expect("decode"),
        )
        .expect("typed parse");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_server_message_direct_message_round_trip() {
        server_round_trip(ServerMessage::ReceiveMessage {
            from: "bob".into(),
            message: "see you at 10:30".into(),
        });
    }

    #[test]
    fn test_server_message_user_list_round_trip() {
        server_round_trip(ServerMessage::UserList {
            users: vec![
                UserInfo {
                    id: ClientId::new(),
                    username: "alice".into(),
                },
                UserInfo {
                    id: ClientId::new(),
                    username: "bob".into(),
                },
            ],
        });
    }

    #[test]
    fn test_server_message_room_created_round_trip() {
        server_round_trip(ServerMessage::RoomCreated { room: room_info() });
    }

    #[test]
    fn test_server_message_room_message_round_trip() {
        server_round_trip(ServerMessage::RoomMessage {
            room: RoomId::new(),
            from: "carol".into(),
            message: "ratio is 3:1".into(),
        });
    }

    #[test]
    fn test_server_message_paged_room_list_round_trip() {
        server_round_trip(ServerMessage::RoomListPage {
            page: Page {
                index: 2,
                is_last: true,
                items: vec!["{\"a\":1}".into(), "plain".into()],
            },
        });
    }

    #[test]
    fn test_server_message_room_scoped_page_round_trip() {
        server_round_trip(ServerMessage::RoomUserListPage {
            room: RoomId::new(),
            page: Page {
                index: 0,
                is_last: false,
                items: vec!["x".into()],
            },
        });
    }

    #[test]
    fn test_server_message_ban_list_round_trip() {
        server_round_trip(ServerMessage::RoomBanList {
            room: RoomId::new(),
            banned: vec![ClientId::new(), ClientId::new()],
        });
    }

    #[test]
    fn test_server_message_error_round_trip() {
        server_round_trip(ServerMessage::Error {
            offending: "CREATEROOM".into(),
            tag: ErrorTag::Auth,
            detail: "not authenticated".into(),
        });
    }

    #[test]
    fn test_server_message_rejects_client_origin_kind() {
        let frame = Frame::decode("GETUSERLIST").expect("frame decodes");
        assert!(matches!(
            ServerMessage::from_frame(frame),
            Err(ProtocolError::UnexpectedKind(MessageKind::GetUserList))
        ));
    }

    #[test]
    fn test_server_message_error_frame_shape() {
        let msg = ServerMessage::Error {
            offending: MessageKind::SendToUser.token().into(),
            tag: ErrorTag::NotFound,
            detail: "no such user: eve".into(),
        };
        let wire = msg
            .to_frame()
            .expect("to_frame")
            .encode()
            .expect("encode");
        assert_eq!(
            wire,
            "ERROR:SENDMESGTOUSER:NOTFOUND:no such user: eve"
        );
    }
}
