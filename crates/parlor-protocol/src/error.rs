//! Error types for the protocol layer.

use crate::MessageKind;

/// Errors produced while encoding or decoding wire frames.
///
/// Decoding is total: any input byte sequence either yields a valid frame
/// or one of these variants. Nothing here ever terminates a connection —
/// the dispatcher answers with an `ERROR` frame and keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid UTF-8 or is structurally unusable.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The kind token is not part of the protocol.
    #[error("unknown message kind {0:?}")]
    UnknownKind(String),

    /// The kind exists but may not be sent by this side of the connection.
    #[error("unexpected {0} frame from client")]
    UnexpectedKind(MessageKind),

    /// The frame carries the wrong number of fields for its kind.
    #[error("{kind} expects {expected} fields, frame has {got}")]
    FieldCount {
        kind: MessageKind,
        expected: usize,
        got: usize,
    },

    /// A non-trailing field contains the separator. Only the trailing
    /// field may carry it.
    #[error("{kind} field {index} contains the separator")]
    SeparatorInField { kind: MessageKind, index: usize },

    /// A field failed to parse as its expected type (guid, number, flag,
    /// visibility token).
    #[error("{kind} field {index}: {reason}")]
    InvalidField {
        kind: MessageKind,
        index: usize,
        reason: String,
    },

    /// A JSON trailing payload failed to serialize or deserialize.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
