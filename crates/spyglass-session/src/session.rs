//! Session types: the server's record of one durable player.

use std::time::Instant;

use spyglass_protocol::PlayerId;
use spyglass_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected player's session is kept
    /// before [`SessionManager::prune`](crate::SessionManager::prune)
    /// forgets it.
    ///
    /// This only bounds memory. It does not evict anyone from a room: a
    /// player who comes back later simply gets a fresh session and
    /// rejoins their seat by durable id.
    ///
    /// Default: 1 hour.
    pub retain_disconnected_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retain_disconnected_secs: 3600,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Whether a player currently has a live connection.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(prune)──→ (gone)
///       ↑                            │
///       └──────────(bind)────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The given connection currently speaks for this player.
    Connected { connection: ConnectionId },

    /// The player's last connection went away at `since`.
    Disconnected { since: Instant },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub state: SessionState,
}

impl Session {
    /// The player's live connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        match self.state {
            SessionState::Connected { connection } => Some(connection),
            SessionState::Disconnected { .. } => None,
        }
    }
}
