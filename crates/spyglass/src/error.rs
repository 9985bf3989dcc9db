//! Unified error type for Spyglass.

use spyglass_protocol::ProtocolError;
use spyglass_room::RoomError;
use spyglass_session::SessionError;
use spyglass_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SpyglassError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad catalog).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (identity rejected, unknown connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use spyglass_protocol::{PlayerId, RoomCode};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let spyglass_err: SpyglassError = err.into();
        assert!(matches!(spyglass_err, SpyglassError::Transport(_)));
        assert!(spyglass_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidRoomCode("abc".into());
        let spyglass_err: SpyglassError = err.into();
        assert!(matches!(spyglass_err, SpyglassError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotFound(PlayerId::new("token-1"));
        let spyglass_err: SpyglassError = err.into();
        assert!(matches!(spyglass_err, SpyglassError::Session(_)));
    }

    #[test]
    fn test_from_room_error_keeps_message() {
        let code = RoomCode::parse("ABCD").unwrap();
        let spyglass_err: SpyglassError = RoomError::RoomFull(code).into();
        assert!(matches!(spyglass_err, SpyglassError::Room(_)));
        assert_eq!(spyglass_err.to_string(), "room ABCD is full");
    }
}
