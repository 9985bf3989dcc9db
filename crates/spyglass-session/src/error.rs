//! Error types for the session layer.

use spyglass_protocol::PlayerId;
use spyglass_transport::ConnectionId;

/// Errors that can occur while resolving player identity.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The durable token was rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The connection isn't bound to any player, or it was displaced by a
    /// newer connection for the same player.
    #[error("{0} is not bound to a player")]
    UnknownConnection(ConnectionId),
}
