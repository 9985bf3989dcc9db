//! The session manager: which connection speaks for which player.
//!
//! Every event a client sends arrives on a connection. Before the server
//! can act on it, it needs the durable [`PlayerId`] behind that
//! connection, and it needs to know the connection is still the *current*
//! one for that player. Both questions are answered here.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain struct over `HashMap`s. The server wraps it
//! in a mutex; nothing in here awaits.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use spyglass_protocol::PlayerId;
use spyglass_transport::ConnectionId;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// The outcome of [`SessionManager::bind`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The player this connection spoke for before, if it switched
    /// identity. That player is now disconnected.
    pub previous_player: Option<PlayerId>,
}

/// Tracks every known player and their current connection.
///
/// ## Lifecycle
///
/// ```text
/// bind() ──→ [Connected] ──→ disconnect() ──→ [Disconnected] ──→ prune()
///    ↑                                              │
///    └──────────────────────────────────────────────┘
/// ```
pub struct SessionManager {
    /// All sessions, keyed by durable identity.
    sessions: HashMap<PlayerId, Session>,

    /// Reverse index: live connection → player. Only current connections
    /// appear here; a displaced connection is removed the moment it is
    /// displaced.
    connections: HashMap<ConnectionId, PlayerId>,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            connections: HashMap::new(),
            config,
        }
    }

    /// Makes `connection` the current connection for `player_id`.
    ///
    /// Binding is idempotent. If the player was bound to a different
    /// connection, that one is displaced: it can no longer act for the
    /// player and its eventual disconnect is ignored. If `connection` used
    /// to speak for a different player, that player is left disconnected.
    pub fn bind(&mut self, player_id: PlayerId, connection: ConnectionId) -> Binding {
        let mut binding = Binding::default();

        if let Some(previous) = self.connections.get(&connection) {
            if *previous == player_id {
                return binding;
            }
            let previous = previous.clone();
            if let Some(session) = self.sessions.get_mut(&previous) {
                session.state = SessionState::Disconnected {
                    since: Instant::now(),
                };
            }
            tracing::info!(%connection, player_id = %previous, "connection switched identity");
            binding.previous_player = Some(previous);
        }

        let session = self
            .sessions
            .entry(player_id.clone())
            .or_insert_with(|| Session {
                player_id: player_id.clone(),
                state: SessionState::Disconnected {
                    since: Instant::now(),
                },
            });

        let displaced = match session.state {
            SessionState::Connected { connection: old } => Some(old),
            SessionState::Disconnected { .. } => None,
        };
        session.state = SessionState::Connected { connection };
        if let Some(old) = displaced {
            self.connections.remove(&old);
        }
        self.connections.insert(connection, player_id.clone());

        match displaced {
            Some(old) => tracing::info!(%player_id, %connection, %old, "connection displaced"),
            None => tracing::debug!(%player_id, %connection, "session bound"),
        }
        binding
    }

    /// The current connection for a player, if they have one.
    pub fn resolve(&self, player_id: &PlayerId) -> Option<ConnectionId> {
        self.sessions.get(player_id).and_then(Session::connection)
    }

    /// The player a connection currently speaks for.
    ///
    /// Returns `None` for unknown connections and for connections that
    /// were displaced.
    pub fn identify(&self, connection: ConnectionId) -> Option<&PlayerId> {
        self.connections.get(&connection)
    }

    /// Handles a closed connection.
    ///
    /// Only the player's *current* connection can disconnect them. Returns
    /// the player who is now disconnected.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownConnection`] if the connection isn't
    /// bound, which includes connections that were already displaced.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Result<PlayerId, SessionError> {
        let player_id = self
            .connections
            .remove(&connection)
            .ok_or(SessionError::UnknownConnection(connection))?;

        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;
        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };

        tracing::info!(%player_id, %connection, "player disconnected");
        Ok(player_id)
    }

    /// Forgets sessions that have been disconnected for longer than
    /// [`SessionConfig::retain_disconnected_secs`]. Returns who was removed.
    pub fn prune(&mut self) -> Vec<PlayerId> {
        let retain = Duration::from_secs(self.config.retain_disconnected_secs);
        let mut pruned = Vec::new();

        self.sessions.retain(|player_id, session| match session.state {
            SessionState::Disconnected { since } if since.elapsed() >= retain => {
                pruned.push(player_id.clone());
                false
            }
            _ => true,
        });

        if !pruned.is_empty() {
            tracing::debug!(count = pruned.len(), "pruned stale sessions");
        }
        pruned
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Number of known sessions, connected or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of players with a live connection.
    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
