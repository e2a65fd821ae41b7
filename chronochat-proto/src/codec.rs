//! Serialization for chat payloads.
//!
//! Payloads are encoded with postcard and carried as the opaque content of
//! a signed [`Data`](crate::packet::Data) packet.

use crate::message::ChatPayload;

/// Maximum accepted encoded payload size in bytes (8 KB).
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The encoded bytes exceed [`MAX_PAYLOAD_SIZE`].
    #[error("payload too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Encodes a [`ChatPayload`] into a byte vector.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the payload cannot be serialized,
/// or `CodecError::TooLarge` if the encoding exceeds [`MAX_PAYLOAD_SIZE`].
pub fn encode(payload: &ChatPayload) -> Result<Vec<u8>, CodecError> {
    let bytes =
        postcard::to_allocvec(payload).map_err(|e| CodecError::Serialization(e.to_string()))?;
    check_size(bytes.len())?;
    Ok(bytes)
}

/// Decodes a [`ChatPayload`] from a byte slice.
///
/// # Errors
///
/// Returns `CodecError::TooLarge` for oversized input, or
/// `CodecError::Serialization` if the bytes are not a valid payload.
pub fn decode(bytes: &[u8]) -> Result<ChatPayload, CodecError> {
    check_size(bytes.len())?;
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn check_size(size: usize) -> Result<(), CodecError> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(CodecError::TooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;

    #[test]
    fn chat_payload_survives_encoding() {
        let original = ChatPayload::chat("alice", "lobby", "hello, world!", 1_700_000_000);
        let bytes = encode(&original).unwrap();
        assert_eq!(decode(&bytes).unwrap(), original);
    }

    #[test]
    fn control_payload_has_no_text_after_decoding() {
        let original = ChatPayload::control("bob", "lobby", MessageType::Leave, 1_700_000_000);
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded.kind, MessageType::Leave);
        assert!(decoded.data.is_none());
    }

    #[test]
    fn message_type_encodes_as_its_discriminant() {
        let payload = ChatPayload::control("", "", MessageType::Hello, 0);
        let bytes = encode(&payload).unwrap();
        // Two empty strings (length 0 each), then the variant index.
        assert_eq!(bytes[2], MessageType::Hello as u8);
    }

    #[test]
    fn decode_garbage_returns_error() {
        let result = decode(&[0xff, 0xfe, 0xfd, 0xfc, 0xfb]);
        assert!(matches!(result, Err(CodecError::Serialization(_))));
    }

    #[test]
    fn decode_truncated_bytes_returns_error() {
        let bytes = encode(&ChatPayload::chat("alice", "lobby", "truncate me", 1)).unwrap();
        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn decode_empty_bytes_returns_error() {
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn oversized_text_is_rejected() {
        let text = "a".repeat(MAX_PAYLOAD_SIZE);
        let result = encode(&ChatPayload::chat("alice", "lobby", &text, 1));
        assert!(matches!(result, Err(CodecError::TooLarge { .. })));
        assert!(matches!(
            decode(&vec![0; MAX_PAYLOAD_SIZE + 1]),
            Err(CodecError::TooLarge { .. })
        ));
    }
}
