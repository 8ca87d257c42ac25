//! Frame codec: colon-separated fields with a verbatim trailing field.
//!
//! A frame looks like
//!
//! ```text
//! KIND:FIELD_1:...:FIELD_{N-1}:TRAILING
//! ```
//!
//! where N is fixed per kind ([`MessageKind::field_count`]). Decoding splits
//! exactly N−1 leading fields off the front and takes everything after the
//! last of those splits as the trailing field, verbatim. That is what makes
//! it safe for the trailing field to carry free text or JSON containing
//! `:` — the decoder never counts separators from the end of the frame.
//!
//! Encoding enforces the mirror-image rule: a separator in any non-trailing
//! field is rejected, because such a frame could not decode back to the
//! same fields. Within that rule, `Frame::decode(&frame.encode()?)` always
//! reproduces the original kind and fields.

use crate::{MessageKind, ProtocolError};

/// The reserved field separator.
pub const SEPARATOR: char = ':';

/// A decoded wire frame: a kind and its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageKind,
    pub fields: Vec<String>,
}

impl Frame {
    /// Builds a frame from a kind and its fields.
    ///
    /// The field count is not checked here; [`encode`](Self::encode)
    /// validates it so that a mis-built frame is caught before it reaches
    /// the wire.
    pub fn new(kind: MessageKind, fields: Vec<String>) -> Self {
        Self { kind, fields }
    }

    /// Serializes the frame to its wire form.
    ///
    /// # Errors
    /// - [`ProtocolError::FieldCount`] if the field count does not match
    ///   the kind's table entry.
    /// - [`ProtocolError::SeparatorInField`] if a non-trailing field
    ///   contains [`SEPARATOR`].
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let expected = self.kind.field_count();
        if self.fields.len() != expected {
            return Err(ProtocolError::FieldCount {
                kind: self.kind,
                expected,
                got: self.fields.len(),
            });
        }

        for (index, field) in self.fields.iter().enumerate() {
            let trailing = index + 1 == expected;
            if !trailing && field.contains(SEPARATOR) {
                return Err(ProtocolError::SeparatorInField {
                    kind: self.kind,
                    index,
                });
            }
        }

        let mut out = String::from(self.kind.token());
        for field in &self.fields {
            out.push(SEPARATOR);
            out.push_str(field);
        }
        Ok(out)
    }

    /// Parses a wire frame.
    ///
    /// Total over arbitrary input: every string yields either a frame or a
    /// `ProtocolError`; no input can index out of bounds.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let (token, rest) = match raw.split_once(SEPARATOR) {
            Some((token, rest)) => (token, Some(rest)),
            None => (raw, None),
        };

        let kind = MessageKind::from_token(token)
            .ok_or_else(|| ProtocolError::UnknownKind(token.to_string()))?;
        let expected = kind.field_count();

        let fields: Vec<String> = match rest {
            None => Vec::new(),
            // `splitn(expected, ..)` keeps the remainder of the frame —
            // embedded separators included — as the final element.
            Some(rest) => rest
                .splitn(expected.max(1), SEPARATOR)
                .map(str::to_string)
                .collect(),
        };

        if fields.len() != expected {
            return Err(ProtocolError::FieldCount {
                kind,
                expected,
                got: fields.len(),
            });
        }

        Ok(Self { kind, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ALL_KINDS;

    fn frame(kind: MessageKind, fields: &[&str]) -> Frame {
        Frame::new(kind, fields.iter().map(|f| f.to_string()).collect())
    }

    // =====================================================================
    // Round trips
    // =====================================================================

    #[test]
    fn test_round_trip_trailing_field_with_embedded_separator() {
        // The message field may carry the separator; it must come back
        // intact, not truncated at the embedded ':'.
        let original = frame(
            MessageKind::SendToUser,
            &["alice", "hello:world"],
        );
        let wire = original.encode().expect("encode");
        assert_eq!(wire, "SENDMESGTOUSER:alice:hello:world");

        let decoded = Frame::decode(&wire).expect("decode");
        assert_eq!(decoded, original);
        assert_eq!(decoded.fields[1], "hello:world");
    }

    #[test]
    fn test_round_trip_trailing_json_payload() {
        let original = frame(
            MessageKind::UserList,
            &[r#"[{"id":"1","username":"a:b"}]"#],
        );
        let wire = original.encode().expect("encode");
        let decoded = Frame::decode(&wire).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_round_trip_zero_field_kind() {
        let original = frame(MessageKind::GetUserList, &[]);
        let wire = original.encode().expect("encode");
        assert_eq!(wire, "GETUSERLIST");
        assert_eq!(Frame::decode(&wire).expect("decode"), original);
    }

    #[test]
    fn test_round_trip_empty_trailing_field() {
        // An empty message is still a frame: "SENDMESGTOALL:".
        let original = frame(MessageKind::SendToAll, &[""]);
        let wire = original.encode().expect("encode");
        assert_eq!(wire, "SENDMESGTOALL:");
        assert_eq!(Frame::decode(&wire).expect("decode"), original);
    }

    #[test]
    fn test_round_trip_every_kind_with_placeholder_fields() {
        // Sweep the whole table with separator-free fields; the law must
        // hold regardless of kind or field count.
        for kind in ALL_KINDS {
            let fields: Vec<String> =
                (0..kind.field_count()).map(|i| format!("f{i}")).collect();
            let original = Frame::new(*kind, fields);
            let wire = original.encode().expect("encode");
            let decoded = Frame::decode(&wire).expect("decode");
            assert_eq!(decoded, original, "round trip failed for {kind}");
        }
    }

    // =====================================================================
    // Encode validation
    // =====================================================================

    #[test]
    fn test_encode_rejects_separator_in_leading_field() {
        let bad = frame(MessageKind::SendToUser, &["ali:ce", "hi"]);
        assert!(matches!(
            bad.encode(),
            Err(ProtocolError::SeparatorInField { index: 0, .. })
        ));
    }

    #[test]
    fn test_encode_rejects_wrong_field_count() {
        let bad = frame(MessageKind::SendToUser, &["alice"]);
        assert!(matches!(
            bad.encode(),
            Err(ProtocolError::FieldCount {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    // =====================================================================
    // Decode totality
    // =====================================================================

    #[test]
    fn test_decode_unknown_kind() {
        assert!(matches!(
            Frame::decode("FLYTOMOON:9000"),
            Err(ProtocolError::UnknownKind(token)) if token == "FLYTOMOON"
        ));
    }

    #[test]
    fn test_decode_empty_input_is_unknown_kind() {
        assert!(matches!(
            Frame::decode(""),
            Err(ProtocolError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_decode_missing_fields() {
        // SENDMESGTOUSER needs two fields; only one present.
        assert!(matches!(
            Frame::decode("SENDMESGTOUSER:alice"),
            Err(ProtocolError::FieldCount {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_zero_field_kind_with_spurious_fields() {
        assert!(matches!(
            Frame::decode("GETUSERLIST:extra"),
            Err(ProtocolError::FieldCount {
                expected: 0,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_bare_kind_missing_all_fields() {
        assert!(matches!(
            Frame::decode("SENDMESGTOUSER"),
            Err(ProtocolError::FieldCount { got: 0, .. })
        ));
    }

    #[test]
    fn test_decode_never_panics_on_garbage() {
        for raw in [
            ":",
            "::::",
            ":leading",
            "AUTH",
            "ERROR:",
            "\u{0}\u{1}binary-ish",
            "SENDMESGTOUSER:",
        ] {
            // Any result is fine; reaching it without a panic is the point.
            let _ = Frame::decode(raw);
        }
    }
}
