//! Error types for the protocol layer.
//!
//! Each crate in Spyglass defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in the shape of wire data,
//! not in networking or game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown event `type`, missing
    /// fields, or a room code that doesn't parse.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code with the wrong length or characters.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),

    /// A location catalog that can't back a playable room.
    #[error("invalid location catalog: {0}")]
    InvalidCatalog(String),

    /// The message is well-formed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
