//! Codec trait and implementations for serializing/deserializing events.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The server doesn't care HOW events are serialized, it just needs
//! something that implements [`Codec`]. Today that is [`JsonCodec`],
//! which browser clients can read without any extra tooling.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use spyglass_protocol::{ClientEvent, Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = br#"{"payload":{"type":"heartbeat","clientTime":5000}}"#;
/// let envelope: Envelope<ClientEvent> = codec.decode(frame).unwrap();
/// assert_eq!(envelope.payload, ClientEvent::Heartbeat { client_time: 5000 });
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let again: Envelope<ClientEvent> = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, again);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
