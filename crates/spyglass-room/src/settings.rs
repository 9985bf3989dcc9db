//! Host-only settings changes. Lobby only.
//!
//! Every successful change broadcasts the full settings snapshot. A change
//! that would leave fewer than [`Settings::MIN_ACTIVE_LOCATIONS`] active
//! locations is rejected whole.

use spyglass_protocol::{PlayerId, Recipient, ServerEvent, SettingKey, Settings};

use crate::state::Events;
use crate::{Room, RoomError, RoomStatus};

impl Room {
    /// Sets the round duration or spy count, clamped into range.
    pub fn update_setting(
        &mut self,
        actor: &PlayerId,
        key: SettingKey,
        value: i64,
    ) -> Result<Events, RoomError> {
        self.require_settings_access(actor)?;
        let value = Settings::clamp(key, value);
        match key {
            SettingKey::Time => self.settings.duration_minutes = value,
            SettingKey::Spies => self.settings.spy_count = value,
        }
        tracing::debug!(code = %self.code, ?key, value, "setting updated");
        Ok(self.settings_event())
    }

    /// Flips one location in or out of the active set.
    ///
    /// # Errors
    /// Returns [`RoomError::Invalid`] for a location outside the catalog or
    /// for removing one of the last two.
    pub fn toggle_location(&mut self, actor: &PlayerId, location: &str) -> Result<Events, RoomError> {
        self.require_settings_access(actor)?;
        if !self.catalog.contains(location) {
            return Err(RoomError::Invalid(format!("unknown location {location:?}")));
        }

        let active = &mut self.settings.active_locations;
        if let Some(index) = active.iter().position(|l| l == location) {
            if active.len() <= Settings::MIN_ACTIVE_LOCATIONS {
                return Err(RoomError::Invalid(format!(
                    "at least {} locations must stay active",
                    Settings::MIN_ACTIVE_LOCATIONS
                )));
            }
            active.remove(index);
        } else {
            active.push(location.to_string());
        }
        Ok(self.settings_event())
    }

    /// Enables or disables every location of a pack at once.
    ///
    /// # Errors
    /// Returns [`RoomError::Invalid`] for an unknown pack or for a removal
    /// that would leave too few active locations. Nothing is changed in
    /// either case.
    pub fn toggle_pack(
        &mut self,
        actor: &PlayerId,
        pack_name: &str,
        enable: bool,
    ) -> Result<Events, RoomError> {
        self.require_settings_access(actor)?;
        let pack = self
            .catalog
            .pack(pack_name)
            .ok_or_else(|| RoomError::Invalid(format!("unknown pack {pack_name:?}")))?;

        let active = &mut self.settings.active_locations;
        if enable {
            for location in &pack.locations {
                if !active.contains(location) {
                    active.push(location.clone());
                }
            }
        } else {
            let remaining: Vec<String> = active
                .iter()
                .filter(|l| !pack.locations.contains(*l))
                .cloned()
                .collect();
            if remaining.len() < Settings::MIN_ACTIVE_LOCATIONS {
                return Err(RoomError::Invalid(format!(
                    "disabling {pack_name:?} would leave {} active locations",
                    remaining.len()
                )));
            }
            *active = remaining;
        }
        Ok(self.settings_event())
    }

    fn require_settings_access(&self, actor: &PlayerId) -> Result<(), RoomError> {
        self.require_host(actor)?;
        self.require_status(RoomStatus::Lobby)
    }

    fn settings_event(&self) -> Events {
        vec![(
            Recipient::All,
            ServerEvent::SettingsChanged {
                settings: self.settings.clone(),
            },
        )]
    }
}
