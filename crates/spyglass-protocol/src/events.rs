//! The event catalog: every message a client or the server can send.
//!
//! Both enums are *internally tagged*: the variant name travels in a
//! `"type"` field next to the variant's own fields, e.g.
//!
//! ```json
//! { "type": "joinGame", "code": "AB12", "name": "Ann", "durableId": "…" }
//! ```
//!
//! which is the shape browser clients find easiest to switch on.

use serde::{Deserialize, Serialize};
use spyglass_transport::ConnectionId;

use crate::{LocationCatalog, Role, RoomCode, RosterEntry, SettingKey, Settings, Winner};

/// The top-level frame. Every message on the wire is an `Envelope`.
///
/// Server frames carry a per-connection sequence number and the server's
/// clock (milliseconds since start). Clients may omit both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, payload: T) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

/// Client → Server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Open a new room with the sender as host.
    CreateGame { name: String, durable_id: String },

    /// Enter an existing room. A durable id that is already in the room
    /// updates that player instead of adding a new one.
    JoinGame {
        code: RoomCode,
        name: String,
        durable_id: String,
    },

    /// Resume a previous seat after a reconnect.
    RejoinGame { code: RoomCode, durable_id: String },

    /// Leave the room for good.
    LeaveGame { code: RoomCode },

    /// Host only: change round duration or spy count.
    UpdateSettings {
        code: RoomCode,
        key: SettingKey,
        value: i64,
    },

    /// Host only: flip one location on or off.
    ToggleLocation { code: RoomCode, location: String },

    /// Host only: enable or disable a whole pack.
    TogglePack {
        code: RoomCode,
        pack_name: String,
        enable: bool,
    },

    /// Host only: deal roles and start the clock.
    StartGame { code: RoomCode },

    /// Spy only: name the location and end the round.
    SpyGuess { code: RoomCode, location: String },

    /// Accuse another player.
    StartVote {
        code: RoomCode,
        target_connection_id: ConnectionId,
    },

    /// Ballot on the pending accusation.
    SubmitVote { code: RoomCode, decision: bool },

    /// Host only: discard the round and go back to the lobby.
    ReturnToLobby { code: RoomCode },

    /// Keep-alive. Answered with [`ServerEvent::HeartbeatAck`].
    Heartbeat { client_time: u64 },
}

impl ClientEvent {
    /// The room this event targets, if it targets one.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            Self::JoinGame { code, .. }
            | Self::RejoinGame { code, .. }
            | Self::LeaveGame { code }
            | Self::UpdateSettings { code, .. }
            | Self::ToggleLocation { code, .. }
            | Self::TogglePack { code, .. }
            | Self::StartGame { code }
            | Self::SpyGuess { code, .. }
            | Self::StartVote { code, .. }
            | Self::SubmitVote { code, .. }
            | Self::ReturnToLobby { code } => Some(code),
            Self::CreateGame { .. } | Self::Heartbeat { .. } => None,
        }
    }
}

/// Server → Client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// You are in the room. Sent to the joining player only.
    Joined {
        code: RoomCode,
        is_host: bool,
        settings: Settings,
        location_catalog: LocationCatalog,
    },

    /// The full roster, in join order.
    UpdatePlayers { roster: Vec<RosterEntry> },

    /// The full settings snapshot after a change.
    SettingsChanged { settings: Settings },

    /// A round started. Personalized: spies receive
    /// [`MASKED_LOCATION`](crate::MASKED_LOCATION) instead of the secret.
    GameStarted {
        role: Role,
        location: String,
        is_role_holder: bool,
        seconds_remaining: u32,
        active_locations: Vec<String>,
        roster: Vec<RosterEntry>,
    },

    /// Someone was accused.
    VoteStarted {
        target_name: String,
        initiator_name: String,
        target_id: ConnectionId,
    },

    /// The accusation failed. A successful vote is reported by the
    /// following [`ServerEvent::GameOver`] instead.
    VoteResult { success: bool, message: String },

    /// The round is over. Sent exactly once per round.
    GameOver {
        winner: Winner,
        reason: String,
        revealed_location: String,
        role_holder_names: Vec<String>,
    },

    /// The host sent everyone back to the lobby.
    ReturnToLobby,

    /// The room or seat to rejoin no longer exists. Clients should drop
    /// their cached session.
    SessionExpired,

    /// Something the player asked for couldn't be done.
    Error { message: String },

    /// Reply to [`ClientEvent::Heartbeat`].
    HeartbeatAck { client_time: u64, server_time: u64 },
}
