//! Error types for the room layer.
//!
//! The variants follow how the server reacts to them: authority and state
//! conflicts are dropped silently, validation failures are rejected
//! without partial changes, and missing rooms or players are reported back
//! to the client.

use spyglass_protocol::{PlayerId, RoomCode};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// A host-only action from someone who isn't the host.
    #[error("only the host can do that")]
    NotHost,

    /// A spy-only action from a civilian.
    #[error("only a spy can do that")]
    NotRoleHolder,

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The player isn't in this room.
    #[error("player {0} not in room")]
    PlayerNotFound(PlayerId),

    /// The action isn't valid for the room's current status.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// A value out of range, an unknown location, or a change that would
    /// leave too few active locations.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// No more player slots.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Every candidate room code was already taken.
    #[error("no free room code available")]
    CodesExhausted,

    /// The room actor is gone or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// Whether the client should be told about this error. Everything
    /// else is a silent no-op from the client's point of view.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::PlayerNotFound(_)
                | Self::RoomFull(_)
                | Self::CodesExhausted
                | Self::Unavailable(_)
        )
    }
}
