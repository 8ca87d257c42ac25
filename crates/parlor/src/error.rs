//! Unified error type for the Parlor server.

use parlor_protocol::{ErrorTag, ProtocolError, TransferError};
use parlor_room::RoomError;
use parlor_session::SessionError;
use parlor_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls, so
/// `?` converts layer errors as they bubble up to the dispatcher boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (framing, unknown kind, bad field, payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, lookup, offline recipient).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (capacity, bans, permissions).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A pagination transfer error (overlapping request).
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl ServerError {
    /// The wire tag this error is reported under in an `ERROR` frame.
    ///
    /// `None` for transport failures — those are not reportable to the
    /// peer (the connection itself is the thing that broke); they trigger
    /// session cleanup instead.
    pub fn tag(&self) -> Option<ErrorTag> {
        match self {
            Self::Transport(_) => None,
            Self::Protocol(_) => Some(ErrorTag::Protocol),
            Self::Transfer(TransferError::Busy) => {
                Some(ErrorTag::TransferConflict)
            }
            Self::Session(e) => Some(match e {
                SessionError::AuthFailed(_)
                | SessionError::NotAuthenticated
                | SessionError::AlreadyAuthenticated(_) => ErrorTag::Auth,
                SessionError::NotFound(_)
                | SessionError::UserOffline(_) => ErrorTag::NotFound,
            }),
            Self::Room(e) => Some(match e {
                RoomError::NotFound(_)
                | RoomError::NotMember { .. }
                | RoomError::NotBanned { .. }
                | RoomError::NoApproval { .. } => ErrorTag::NotFound,
                RoomError::Full(_) => ErrorTag::Capacity,
                RoomError::Banned { .. } => ErrorTag::Banned,
                RoomError::Locked(_)
                | RoomError::NotApproved { .. }
                | RoomError::AlreadyMember { .. }
                | RoomError::OutsideRoom { .. }
                | RoomError::NotOwner { .. }
                | RoomError::OwnerProtected(_) => ErrorTag::Permission,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_protocol::{ClientId, RoomId};

    #[test]
    fn test_tag_for_protocol_error() {
        let err: ServerError =
            ProtocolError::UnknownKind("XYZ".into()).into();
        assert_eq!(err.tag(), Some(ErrorTag::Protocol));
    }

    #[test]
    fn test_tag_for_auth_errors() {
        let err: ServerError = SessionError::NotAuthenticated.into();
        assert_eq!(err.tag(), Some(ErrorTag::Auth));

        let err: ServerError =
            SessionError::AlreadyAuthenticated("alice".into()).into();
        assert_eq!(err.tag(), Some(ErrorTag::Auth));
    }

    #[test]
    fn test_tag_for_offline_recipient_is_not_found() {
        let err: ServerError =
            SessionError::UserOffline("bob".into()).into();
        assert_eq!(err.tag(), Some(ErrorTag::NotFound));
    }

    #[test]
    fn test_tag_for_room_errors() {
        let room = RoomId::new();
        let user = ClientId::new();

        let err: ServerError = RoomError::Full(room).into();
        assert_eq!(err.tag(), Some(ErrorTag::Capacity));

        let err: ServerError = RoomError::Banned { user, room }.into();
        assert_eq!(err.tag(), Some(ErrorTag::Banned));

        let err: ServerError = RoomError::Locked(room).into();
        assert_eq!(err.tag(), Some(ErrorTag::Permission));

        let err: ServerError = RoomError::NotFound(room).into();
        assert_eq!(err.tag(), Some(ErrorTag::NotFound));
    }

    #[test]
    fn test_tag_for_transfer_conflict() {
        let err: ServerError = TransferError::Busy.into();
        assert_eq!(err.tag(), Some(ErrorTag::TransferConflict));
    }

    #[test]
    fn test_transport_errors_have_no_wire_tag() {
        let err: ServerError = TransportError::InvalidFrame.into();
        assert_eq!(err.tag(), None);
    }
}
