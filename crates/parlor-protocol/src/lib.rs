//! Wire protocol for Parlor.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Kinds** ([`MessageKind`]) — the closed enumeration of frame kinds,
//!   with each kind's field count, origin, and auth requirement.
//! - **Codec** ([`Frame`]) — colon-framed encode/decode where only the
//!   trailing field may contain the separator.
//! - **Typed surface** ([`ClientCommand`], [`ServerMessage`]) — sum types
//!   the dispatcher and clients match on, plus the JSON payload objects
//!   ([`UserInfo`], [`RoomInfo`]).
//! - **Pagination** ([`paginate`](paginate()), [`TransferAssembler`],
//!   [`OpenTransfers`]) — page splitting and keyed reassembly for large
//!   collections.
//! - **Errors** ([`ProtocolError`], [`TransferError`]).
//!
//! The protocol layer knows nothing about sockets, sessions, or rooms —
//! it only turns bytes into typed messages and back.

mod codec;
mod error;
mod kind;
pub mod paginate;
mod wire;

pub use codec::{Frame, SEPARATOR};
pub use error::ProtocolError;
pub use kind::{MessageKind, Origin, ALL_KINDS};
pub use paginate::{
    paginate, CollectionKind, OpenTransfers, Page, TransferAssembler,
    TransferError, TransferKey,
};
pub use wire::{
    valid_username, ClientCommand, ClientId, ErrorTag, RoomId, RoomInfo,
    ServerMessage, UserInfo, Visibility,
};
