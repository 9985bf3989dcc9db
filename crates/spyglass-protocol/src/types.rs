//! Core data types carried by Spyglass events.
//!
//! Everything here is serialized onto the wire, so the serde attributes
//! are part of the protocol: field names are camelCase, identifiers are
//! plain strings or numbers.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use spyglass_transport::ConnectionId;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's durable identity.
///
/// This is the opaque token a client generates once, persists locally,
/// and presents on every create/join/rejoin. It survives reconnects, so it
/// is the key for all game state. It is also the only credential a client
/// has, which is why it is never echoed to other players and why
/// `Display` only prints a short prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a token. Callers are expected to have validated it
    /// (see the session layer's `Authenticator`).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "P-{prefix}")
    }
}

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 4;

/// Characters a room code is drawn from.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The short human-entered code that names a room.
///
/// Codes are case-insensitive on input: `"ab12"` parses to `AB12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses and normalizes a room code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] if the code has the wrong
    /// length or contains characters outside [`ROOM_CODE_ALPHABET`].
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let normalized = value.trim().to_ascii_uppercase();
        let valid = normalized.chars().count() == ROOM_CODE_LEN
            && normalized.chars().all(|ch| ROOM_CODE_ALPHABET.contains(ch));
        if !valid {
            return Err(ProtocolError::InvalidRoomCode(value.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive a server event.
///
/// The room state machine returns `(Recipient, ServerEvent)` pairs; the
/// room actor resolves each recipient to the players' current
/// connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the given player.
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Which scalar setting an `updateSettings` event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKey {
    /// Round duration in minutes.
    Time,
    /// Number of spies.
    Spies,
}

/// Round configuration for a room. Always sent as a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Round length in minutes, within [`Settings::DURATION_RANGE`].
    #[serde(rename = "time")]
    pub duration_minutes: u8,
    /// Configured spy count, within [`Settings::SPY_RANGE`]. The count used
    /// for a round is further capped at `players - 1`.
    #[serde(rename = "spies")]
    pub spy_count: u8,
    /// Locations the secret may be drawn from, in the order they were
    /// enabled. Never shorter than [`Settings::MIN_ACTIVE_LOCATIONS`].
    pub active_locations: Vec<String>,
}

impl Settings {
    pub const DURATION_RANGE: std::ops::RangeInclusive<u8> = 1..=15;
    pub const SPY_RANGE: std::ops::RangeInclusive<u8> = 1..=3;
    pub const MIN_ACTIVE_LOCATIONS: usize = 2;
    pub const DEFAULT_DURATION_MINUTES: u8 = 5;
    pub const DEFAULT_SPY_COUNT: u8 = 1;

    /// Default settings with the given active locations.
    pub fn with_locations(active_locations: Vec<String>) -> Self {
        Self {
            duration_minutes: Self::DEFAULT_DURATION_MINUTES,
            spy_count: Self::DEFAULT_SPY_COUNT,
            active_locations,
        }
    }

    /// Clamps a raw client value into the range allowed for `key`.
    pub fn clamp(key: SettingKey, value: i64) -> u8 {
        let range = match key {
            SettingKey::Time => Self::DURATION_RANGE,
            SettingKey::Spies => Self::SPY_RANGE,
        };
        value.clamp(i64::from(*range.start()), i64::from(*range.end())) as u8
    }

    pub fn is_active(&self, location: &str) -> bool {
        self.active_locations.iter().any(|l| l == location)
    }

    /// Round length in seconds.
    pub fn duration_secs(&self) -> u32 {
        u32::from(self.duration_minutes) * 60
    }
}

// ---------------------------------------------------------------------------
// Location catalog
// ---------------------------------------------------------------------------

/// A named group of locations that can be toggled as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPack {
    pub name: String,
    pub locations: Vec<String>,
}

impl LocationPack {
    pub fn new(name: impl Into<String>, locations: &[&str]) -> Self {
        Self {
            name: name.into(),
            locations: locations.iter().map(|l| (*l).to_string()).collect(),
        }
    }
}

/// Every location a room may choose from, grouped into packs.
///
/// A catalog is either *grouped* (several named packs, toggled with
/// `togglePack`) or *flat* (one pack holding everything). Rooms are built
/// against one catalog and never mix the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationCatalog {
    packs: Vec<LocationPack>,
}

impl LocationCatalog {
    /// Name of the single pack in a flat catalog.
    pub const FLAT_PACK_NAME: &'static str = "All";

    /// Builds a pack-grouped catalog.
    ///
    /// # Errors
    /// Rejects catalogs with fewer than two distinct locations, empty or
    /// duplicate pack names, empty location names, or a location listed
    /// twice.
    pub fn grouped(packs: Vec<LocationPack>) -> Result<Self, ProtocolError> {
        let mut pack_names = HashSet::new();
        let mut seen = HashSet::new();
        for pack in &packs {
            if pack.name.trim().is_empty() {
                return Err(ProtocolError::InvalidCatalog("empty pack name".into()));
            }
            if !pack_names.insert(pack.name.as_str()) {
                return Err(ProtocolError::InvalidCatalog(format!(
                    "duplicate pack {:?}",
                    pack.name
                )));
            }
            for location in &pack.locations {
                if location.trim().is_empty() {
                    return Err(ProtocolError::InvalidCatalog(format!(
                        "empty location in pack {:?}",
                        pack.name
                    )));
                }
                if !seen.insert(location.as_str()) {
                    return Err(ProtocolError::InvalidCatalog(format!(
                        "location {location:?} listed twice"
                    )));
                }
            }
        }
        if seen.len() < Settings::MIN_ACTIVE_LOCATIONS {
            return Err(ProtocolError::InvalidCatalog(format!(
                "need at least {} locations, got {}",
                Settings::MIN_ACTIVE_LOCATIONS,
                seen.len()
            )));
        }
        Ok(Self { packs })
    }

    /// Builds a flat catalog: one pack named [`Self::FLAT_PACK_NAME`].
    pub fn flat(locations: Vec<String>) -> Result<Self, ProtocolError> {
        Self::grouped(vec![LocationPack {
            name: Self::FLAT_PACK_NAME.to_string(),
            locations,
        }])
    }

    pub fn packs(&self) -> &[LocationPack] {
        &self.packs
    }

    pub fn is_flat(&self) -> bool {
        self.packs.len() == 1
    }

    pub fn pack(&self, name: &str) -> Option<&LocationPack> {
        self.packs.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, location: &str) -> bool {
        self.locations().any(|l| l == location)
    }

    /// All locations across all packs, pack by pack.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.packs
            .iter()
            .flat_map(|p| p.locations.iter().map(String::as_str))
    }

    /// The locations a fresh room starts with: the first pack, or the whole
    /// catalog if the first pack is too small to play with.
    pub fn default_selection(&self) -> Vec<String> {
        match self.packs.first() {
            Some(first) if first.locations.len() >= Settings::MIN_ACTIVE_LOCATIONS => {
                first.locations.clone()
            }
            _ => self.locations().map(str::to_string).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster and roles
// ---------------------------------------------------------------------------

/// One player as other players see them.
///
/// Players are named by their current [`ConnectionId`], never by their
/// durable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: ConnectionId,
    pub name: String,
    pub avatar: u8,
    pub is_host: bool,
    pub connected: bool,
}

/// The placeholder spies receive instead of the secret location.
pub const MASKED_LOCATION: &str = "???";

/// A player's role for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Doesn't know the location; wins by guessing it or by outlasting the
    /// clock.
    Spy,
    /// Knows the location; wins by exposing a spy.
    Civilian,
}

/// Which side won a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Winner {
    Spies,
    Civilians,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spies => write!(f, "spies"),
            Self::Civilians => write!(f, "civilians"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // PlayerId
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_player_id_display_hides_most_of_the_token() {
        let id = PlayerId::new("0123456789abcdef");
        assert_eq!(id.to_string(), "P-012345");
    }

    // =====================================================================
    // RoomCode
    // =====================================================================

    #[test]
    fn test_room_code_parse_normalizes_case() {
        let code = RoomCode::parse("ab12").unwrap();
        assert_eq!(code.as_str(), "AB12");
    }

    #[test]
    fn test_room_code_parse_rejects_wrong_length() {
        assert!(RoomCode::parse("ABC").is_err());
        assert!(RoomCode::parse("ABCDE").is_err());
    }

    #[test]
    fn test_room_code_parse_rejects_bad_characters() {
        assert!(matches!(
            RoomCode::parse("AB-2"),
            Err(ProtocolError::InvalidRoomCode(_))
        ));
    }

    #[test]
    fn test_room_code_deserialize_validates() {
        let code: RoomCode = serde_json::from_str("\"zz99\"").unwrap();
        assert_eq!(code.to_string(), "ZZ99");
        let bad: Result<RoomCode, _> = serde_json::from_str("\"nope!\"");
        assert!(bad.is_err());
    }

    // =====================================================================
    // Settings
    // =====================================================================

    #[test]
    fn test_settings_json_uses_wire_names() {
        let settings = Settings::with_locations(vec!["Beach".into(), "Bank".into()]);
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["time"], 5);
        assert_eq!(json["spies"], 1);
        assert_eq!(json["activeLocations"], serde_json::json!(["Beach", "Bank"]));
    }

    #[test]
    fn test_settings_clamp_bounds_duration_and_spies() {
        assert_eq!(Settings::clamp(SettingKey::Time, 0), 1);
        assert_eq!(Settings::clamp(SettingKey::Time, 99), 15);
        assert_eq!(Settings::clamp(SettingKey::Time, 7), 7);
        assert_eq!(Settings::clamp(SettingKey::Spies, -4), 1);
        assert_eq!(Settings::clamp(SettingKey::Spies, 10), 3);
    }

    #[test]
    fn test_setting_key_is_lowercase_on_the_wire() {
        let key: SettingKey = serde_json::from_str("\"spies\"").unwrap();
        assert_eq!(key, SettingKey::Spies);
    }

    // =====================================================================
    // LocationCatalog
    // =====================================================================

    fn two_packs() -> LocationCatalog {
        LocationCatalog::grouped(vec![
            LocationPack::new("Classic", &["Beach", "School", "Bank"]),
            LocationPack::new("Extreme", &["Prison", "Bunker"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_catalog_grouped_lookup() {
        let catalog = two_packs();
        assert!(!catalog.is_flat());
        assert!(catalog.contains("Bunker"));
        assert!(!catalog.contains("Moon"));
        assert_eq!(catalog.pack("Extreme").unwrap().locations.len(), 2);
        assert_eq!(catalog.locations().count(), 5);
    }

    #[test]
    fn test_catalog_default_selection_is_first_pack() {
        assert_eq!(two_packs().default_selection(), vec!["Beach", "School", "Bank"]);
    }

    #[test]
    fn test_catalog_default_selection_falls_back_to_everything() {
        let catalog = LocationCatalog::grouped(vec![
            LocationPack::new("Tiny", &["Beach"]),
            LocationPack::new("Other", &["Bank"]),
        ])
        .unwrap();
        assert_eq!(catalog.default_selection(), vec!["Beach", "Bank"]);
    }

    #[test]
    fn test_catalog_rejects_too_few_locations() {
        let result = LocationCatalog::flat(vec!["Beach".into()]);
        assert!(matches!(result, Err(ProtocolError::InvalidCatalog(_))));
    }

    #[test]
    fn test_catalog_rejects_duplicate_location() {
        let result = LocationCatalog::grouped(vec![
            LocationPack::new("A", &["Beach", "Bank"]),
            LocationPack::new("B", &["Bank"]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_rejects_duplicate_pack() {
        let result = LocationCatalog::grouped(vec![
            LocationPack::new("A", &["Beach"]),
            LocationPack::new("A", &["Bank"]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_flat_is_single_pack() {
        let catalog = LocationCatalog::flat(vec!["Beach".into(), "Bank".into()]).unwrap();
        assert!(catalog.is_flat());
        assert!(catalog.pack(LocationCatalog::FLAT_PACK_NAME).is_some());
    }

    #[test]
    fn test_catalog_serializes_as_pack_list() {
        let json = serde_json::to_value(two_packs()).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["name"], "Classic");
        assert_eq!(json[1]["locations"][0], "Prison");
    }

    // =====================================================================
    // Roster, roles
    // =====================================================================

    #[test]
    fn test_roster_entry_json_format() {
        let entry = RosterEntry {
            id: ConnectionId::new(3),
            name: "Ann".into(),
            avatar: 2,
            is_host: true,
            connected: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["isHost"], true);
        assert_eq!(json["connected"], false);
    }

    #[test]
    fn test_role_and_winner_are_camel_case() {
        assert_eq!(serde_json::to_string(&Role::Spy).unwrap(), "\"spy\"");
        assert_eq!(serde_json::to_string(&Winner::Civilians).unwrap(), "\"civilians\"");
    }
}
