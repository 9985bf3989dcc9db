//! Room configuration and status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room the manager spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Minimum players required to start a round.
    pub min_players: usize,

    /// Maximum players allowed in a room.
    pub max_players: usize,

    /// Countdown granularity. Ticks are converted to whole seconds of
    /// round time, so any interval keeps rounds at their set length.
    pub tick_interval: Duration,

    /// Capacity of each room actor's command channel.
    pub command_channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 16,
            tick_interval: Duration::from_secs(1),
            command_channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Fixes out-of-range values. A room must fit at least its host plus
    /// one more player, and a channel of zero capacity would panic.
    pub fn validated(mut self) -> Self {
        if self.min_players < 2 {
            tracing::warn!(min_players = self.min_players, "min_players below 2, clamping");
            self.min_players = 2;
        }
        if self.max_players < self.min_players {
            tracing::warn!(
                max_players = self.max_players,
                min_players = self.min_players,
                "max_players below min_players, clamping"
            );
            self.max_players = self.min_players;
        }
        if self.command_channel_size == 0 {
            self.command_channel_size = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Where a room is in its round cycle.
///
/// ```text
///           start_round            finish
///   Lobby ──────────────→ Playing ─────────→ Results
///     ↑                      │                  │
///     └──── return_to_lobby ─┴──────────────────┘
/// ```
///
/// - **Lobby**: players gather, the host edits settings. The only status
///   new players can join in.
/// - **Playing**: roles are dealt and the countdown runs. Guesses and votes
///   are accepted.
/// - **Results**: the round is resolved. The outcome is kept for players
///   who reconnect until the host returns to the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomStatus {
    Lobby,
    Playing,
    Results,
}

impl RoomStatus {
    /// Returns `true` if new players may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` if a round is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Lobby, Self::Playing)
                | (Self::Playing, Self::Results)
                | (Self::Playing, Self::Lobby)
                | (Self::Results, Self::Lobby)
        )
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Playing => write!(f, "playing"),
            Self::Results => write!(f, "results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_status_can_transition_to() {
        assert!(RoomStatus::Lobby.can_transition_to(RoomStatus::Playing));
        assert!(RoomStatus::Playing.can_transition_to(RoomStatus::Results));
        assert!(RoomStatus::Playing.can_transition_to(RoomStatus::Lobby));
        assert!(RoomStatus::Results.can_transition_to(RoomStatus::Lobby));
        assert!(!RoomStatus::Lobby.can_transition_to(RoomStatus::Results));
        assert!(!RoomStatus::Results.can_transition_to(RoomStatus::Playing));
        assert!(!RoomStatus::Results.can_transition_to(RoomStatus::Results));
    }

    #[test]
    fn test_room_status_is_joinable() {
        assert!(RoomStatus::Lobby.is_joinable());
        assert!(!RoomStatus::Playing.is_joinable());
        assert!(!RoomStatus::Results.is_joinable());
    }

    #[test]
    fn test_room_status_is_active() {
        assert!(!RoomStatus::Lobby.is_active());
        assert!(RoomStatus::Playing.is_active());
        assert!(!RoomStatus::Results.is_active());
    }

    #[test]
    fn test_room_status_display() {
        assert_eq!(RoomStatus::Lobby.to_string(), "lobby");
        assert_eq!(RoomStatus::Results.to_string(), "results");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 16);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_room_config_validated_fixes_bad_limits() {
        let config = RoomConfig {
            min_players: 0,
            max_players: 1,
            command_channel_size: 0,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 2);
        assert_eq!(config.command_channel_size, 1);
    }
}
