//! Codec trait and implementations for serializing/deserializing payloads.
//!
//! A codec converts between Rust types and raw datagram bytes. The session
//! client does not care how payloads are serialized; it only needs something
//! that implements [`Codec`].
//!
//! - [`BincodeCodec`]: compact binary, the production wire format.
//! - [`JsonCodec`]: human-readable, handy when inspecting traffic.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is shared with the background
/// read loop, which Tokio may run on any worker thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented in
    /// this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// BincodeCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses bincode's default (little-endian, fixed-int)
/// configuration.
///
/// Trailing bytes after a complete value are rejected, so a datagram that
/// happens to start with a valid prefix still fails to decode.
///
/// ```rust
/// use lockstep_protocol::{BincodeCodec, Codec, Request};
///
/// let codec = BincodeCodec;
/// let bytes = codec.encode(&Request::Ready { is_ready: true }).unwrap();
/// let decoded: Request = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Request::Ready { is_ready: true });
/// ```
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

#[cfg(feature = "bincode")]
fn bincode_options() -> impl bincode::Options {
    use bincode::Options;

    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

#[cfg(feature = "bincode")]
impl Codec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        use bincode::Options;

        bincode_options()
            .serialize(value)
            .map_err(ProtocolError::encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        use bincode::Options;

        bincode_options()
            .deserialize(data)
            .map_err(ProtocolError::decode)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LobbyResponse, Request, RoomResponse};

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_decode_garbage_returns_error() {
        let result: Result<LobbyResponse, _> =
            BincodeCodec.decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_decode_empty_returns_error() {
        let result: Result<RoomResponse, _> = BincodeCodec.decode(&[]);
        assert!(result.is_err());
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_decode_trailing_bytes_returns_error() {
        let mut bytes = BincodeCodec.encode(&RoomResponse::AllReady).unwrap();
        bytes.push(0);
        let result: Result<RoomResponse, _> = BincodeCodec.decode(&bytes);
        assert!(result.is_err());
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_action_payload_survives_intact() {
        let req = Request::Action {
            frame: 120,
            data: vec![0, 1, 2, 254, 255],
        };
        let bytes = BincodeCodec.encode(&req).unwrap();
        let decoded: Request = BincodeCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, req);
    }

    #[cfg(all(feature = "bincode", feature = "json"))]
    #[test]
    fn test_bincode_is_smaller_than_json() {
        let req = Request::Blank {
            frame_id: 1000,
            ack_frame_id: 999,
        };
        let binary = BincodeCodec.encode(&req).unwrap();
        let json = JsonCodec.encode(&req).unwrap();
        assert!(binary.len() < json.len());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_decode_wrong_shape_returns_error() {
        let result: Result<RoomResponse, _> = JsonCodec.decode(br#"{"name":"x"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_protocol_error_display() {
        let err = BincodeCodec.decode::<Request>(&[]).unwrap_err();
        assert!(err.to_string().starts_with("decode failed: "));
    }
}
