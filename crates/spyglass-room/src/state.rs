//! The room state machine: players, presence, and membership.
//!
//! [`Room`] is plain synchronous state. Every operation validates, mutates,
//! and returns the events it produced as `(Recipient, ServerEvent)` pairs;
//! it never sends anything itself. The room actor owns one `Room`, so
//! operations on it never overlap.
//!
//! The round, settings, and vote operations live in their own modules as
//! further `impl Room` blocks.

use std::sync::Arc;

use spyglass_protocol::{
    LocationCatalog, PlayerId, Recipient, RoomCode, RosterEntry, ServerEvent, Settings,
};
use spyglass_transport::ConnectionId;

use crate::round::RoundState;
use crate::vote::VoteState;
use crate::{RoomConfig, RoomError, RoomStatus};

/// Events produced by one room operation, in delivery order.
pub type Events = Vec<(Recipient, ServerEvent)>;

/// Longest display name kept, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Number of distinct avatar tokens.
pub const AVATAR_COUNT: usize = 10;

/// Sent to everyone else when the host leaves.
pub const HOST_LEFT_MESSAGE: &str = "host left the game, room closed";

/// Normalizes a display name: trimmed and capped at [`MAX_NAME_LEN`].
///
/// # Errors
/// Returns [`RoomError::Invalid`] for a name that is empty after trimming.
pub fn display_name(raw: &str) -> Result<String, RoomError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RoomError::Invalid("name must not be empty".into()));
    }
    Ok(trimmed.chars().take(MAX_NAME_LEN).collect())
}

/// A player arriving at a room, before they are admitted.
#[derive(Debug, Clone)]
pub struct Arrival {
    pub player_id: PlayerId,
    pub connection: ConnectionId,
    pub name: String,
}

/// One seat in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Durable identity. Never leaves the server.
    pub id: PlayerId,
    /// The connection events are delivered to. Replaced on rejoin.
    pub connection: ConnectionId,
    pub name: String,
    pub avatar: u8,
    pub connected: bool,
}

/// The result of [`Room::leave`].
#[derive(Debug)]
pub struct Departure {
    pub events: Events,
    /// The room must be deleted: it is empty or its host left.
    pub closed: bool,
}

/// One room: its players, settings, and the round in progress.
#[derive(Debug)]
pub struct Room {
    pub(crate) code: RoomCode,
    pub(crate) catalog: Arc<LocationCatalog>,
    pub(crate) host: PlayerId,
    /// Join order. Unique by `id`.
    pub(crate) players: Vec<Player>,
    pub(crate) status: RoomStatus,
    pub(crate) settings: Settings,
    pub(crate) round: Option<RoundState>,
    pub(crate) vote: Option<VoteState>,
    /// The `gameOver` of the last resolved round, replayed to players who
    /// come back during `Results`.
    pub(crate) outcome: Option<ServerEvent>,
    pub(crate) rounds_started: u64,
    pub(crate) min_players: usize,
    pub(crate) max_players: usize,
}

impl Room {
    /// Opens a room with `host` as its only player.
    ///
    /// # Errors
    /// Returns [`RoomError::Invalid`] if the host's name is empty.
    pub fn open(
        code: RoomCode,
        catalog: Arc<LocationCatalog>,
        config: &RoomConfig,
        host: Arrival,
    ) -> Result<(Self, Events), RoomError> {
        let name = display_name(&host.name)?;
        let settings = Settings::with_locations(catalog.default_selection());
        let room = Self {
            code,
            catalog,
            host: host.player_id.clone(),
            players: vec![Player {
                id: host.player_id.clone(),
                connection: host.connection,
                name,
                avatar: 0,
                connected: true,
            }],
            status: RoomStatus::Lobby,
            settings,
            round: None,
            vote: None,
            outcome: None,
            rounds_started: 0,
            min_players: config.min_players,
            max_players: config.max_players,
        };
        let events = room.welcome(&host.player_id);
        Ok((room, events))
    }

    // -- Accessors ---------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &LocationCatalog {
        &self.catalog
    }

    pub fn host(&self) -> &PlayerId {
        &self.host
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        self.host == *player_id
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *player_id)
    }

    /// The player currently reachable on `connection`.
    pub fn player_by_connection(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection == connection)
    }

    pub fn round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    pub fn vote(&self) -> Option<&VoteState> {
        self.vote.as_ref()
    }

    /// Incremented every time a round starts.
    pub fn rounds_started(&self) -> u64 {
        self.rounds_started
    }

    /// The roster as clients see it.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.players
            .iter()
            .map(|p| RosterEntry {
                id: p.connection,
                name: p.name.clone(),
                avatar: p.avatar,
                is_host: p.id == self.host,
                connected: p.connected,
            })
            .collect()
    }

    // -- Membership ---------------------------------------------------------

    /// Admits a player.
    ///
    /// A durable id already seated here is updated in place (new
    /// connection, new name) in any status and gets the current state
    /// replayed. New players may only join in the lobby.
    ///
    /// # Errors
    /// - [`RoomError::Invalid`]: empty name
    /// - [`RoomError::InvalidState`]: a new player while a round is on
    /// - [`RoomError::RoomFull`]: no free seat
    pub fn join(&mut self, arrival: Arrival) -> Result<Events, RoomError> {
        let name = display_name(&arrival.name)?;

        if let Some(player) = self.player_mut(&arrival.player_id) {
            player.connection = arrival.connection;
            player.name = name;
            player.connected = true;
            tracing::info!(code = %self.code, player_id = %arrival.player_id, "player re-entered");
            return Ok(self.welcome(&arrival.player_id));
        }

        if !self.status.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot join a room in {}",
                self.status
            )));
        }
        if self.players.len() >= self.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        let avatar = (self.players.len() % AVATAR_COUNT) as u8;
        self.players.push(Player {
            id: arrival.player_id.clone(),
            connection: arrival.connection,
            name,
            avatar,
            connected: true,
        });
        tracing::info!(
            code = %self.code,
            player_id = %arrival.player_id,
            players = self.players.len(),
            "player joined"
        );
        Ok(self.welcome(&arrival.player_id))
    }

    /// Rebinds a returning player to a new connection.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the durable id has no seat
    /// here.
    pub fn rejoin(
        &mut self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<Events, RoomError> {
        let player = self
            .player_mut(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?;
        player.connection = connection;
        player.connected = true;
        tracing::info!(code = %self.code, %player_id, %connection, "player rejoined");
        Ok(self.welcome(player_id))
    }

    /// Removes a player for good.
    ///
    /// The host leaving closes the room: everyone else is told and nobody
    /// is removed, since the whole room is about to be deleted. Anyone else
    /// leaving mid-round may settle the round or the vote.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the player has no seat.
    pub fn leave(&mut self, player_id: &PlayerId) -> Result<Departure, RoomError> {
        let index = self
            .position(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?;

        if self.is_host(player_id) {
            tracing::info!(code = %self.code, %player_id, "host left, closing room");
            return Ok(Departure {
                events: vec![(
                    Recipient::AllExcept(player_id.clone()),
                    ServerEvent::Error {
                        message: HOST_LEFT_MESSAGE.into(),
                    },
                )],
                closed: true,
            });
        }

        let leaver = self.players.remove(index);
        tracing::info!(
            code = %self.code,
            %player_id,
            players = self.players.len(),
            "player left"
        );
        if self.players.is_empty() {
            return Ok(Departure {
                events: Vec::new(),
                closed: true,
            });
        }

        let mut events = vec![self.roster_event()];
        if self.status.is_active() {
            events.extend(self.settle_departure(&leaver));
        }
        Ok(Departure {
            events,
            closed: false,
        })
    }

    /// Marks a player offline, but only if `connection` is still theirs.
    /// A connection that was already replaced by a rejoin changes nothing.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the player has no seat.
    pub fn disconnect(
        &mut self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<Events, RoomError> {
        let code = self.code.clone();
        let player = self
            .player_mut(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?;
        if player.connection != connection || !player.connected {
            tracing::debug!(%code, %player_id, %connection, "stale disconnect ignored");
            return Ok(Vec::new());
        }
        player.connected = false;
        tracing::debug!(%code, %player_id, "player offline");
        Ok(vec![self.roster_event()])
    }

    // -- Helpers -----------------------------------------------------------

    pub(crate) fn position(&self, player_id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == *player_id)
    }

    pub(crate) fn player_mut(&mut self, player_id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == *player_id)
    }

    pub(crate) fn require_host(&self, actor: &PlayerId) -> Result<(), RoomError> {
        if self.is_host(actor) {
            Ok(())
        } else {
            Err(RoomError::NotHost)
        }
    }

    pub(crate) fn require_status(&self, expected: RoomStatus) -> Result<(), RoomError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(RoomError::InvalidState(format!(
                "room is in {}, expected {expected}",
                self.status
            )))
        }
    }

    pub(crate) fn require_member(&self, player_id: &PlayerId) -> Result<&Player, RoomError> {
        self.player(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))
    }

    pub(crate) fn roster_event(&self) -> (Recipient, ServerEvent) {
        (
            Recipient::All,
            ServerEvent::UpdatePlayers {
                roster: self.roster(),
            },
        )
    }

    /// `joined` for the player, the roster for everyone, then whatever the
    /// player needs to catch up with the current status.
    fn welcome(&self, player_id: &PlayerId) -> Events {
        let mut events = vec![
            (
                Recipient::Player(player_id.clone()),
                ServerEvent::Joined {
                    code: self.code.clone(),
                    is_host: self.is_host(player_id),
                    settings: self.settings.clone(),
                    location_catalog: (*self.catalog).clone(),
                },
            ),
            self.roster_event(),
        ];
        events.extend(self.replay_for(player_id));
        events
    }
}
