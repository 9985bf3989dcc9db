//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::Arc;

use spyglass_protocol::{LocationCatalog, PlayerId, RoomCode};
use spyglass_transport::ConnectionId;

use crate::code::generate_unique_room_code;
use crate::room::spawn_room;
use crate::state::Arrival;
use crate::{PlayerSender, RoomAction, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Owns every live room and knows which room each player sits in.
///
/// A player is seated in at most one room at a time. Joining or creating
/// another room leaves the previous one.
pub struct RoomManager {
    rooms: HashMap<RoomCode, RoomHandle>,
    player_rooms: HashMap<PlayerId, RoomCode>,
    catalog: Arc<LocationCatalog>,
    config: RoomConfig,
}

impl RoomManager {
    pub fn new(catalog: LocationCatalog, config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            catalog: Arc::new(catalog),
            config: config.validated(),
        }
    }

    /// Opens a room under a fresh code with `host` seated as its host.
    ///
    /// # Errors
    /// - [`RoomError::CodesExhausted`]: no free code was found
    /// - [`RoomError::Invalid`]: empty host name
    pub async fn create(
        &mut self,
        host: Arrival,
        sender: PlayerSender,
    ) -> Result<RoomCode, RoomError> {
        let code = generate_unique_room_code(&mut rand::rng(), |code| {
            self.rooms.contains_key(code)
        })
        .ok_or(RoomError::CodesExhausted)?;

        let player_id = host.player_id.clone();
        let handle = spawn_room(
            code.clone(),
            Arc::clone(&self.catalog),
            &self.config,
            host,
            sender,
        )?;
        self.rooms.insert(code.clone(), handle);
        tracing::info!(%code, rooms = self.rooms.len(), "room created");

        self.seat(player_id, code.clone()).await;
        Ok(code)
    }

    /// Seats a player in an existing room.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`]: no room with that code
    /// - anything the room rejects the join with
    pub async fn join(
        &mut self,
        code: &RoomCode,
        arrival: Arrival,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let player_id = arrival.player_id.clone();
        let handle = self.handle(code)?;
        let result = handle.join(arrival, sender).await;
        self.reap_if_unavailable(&result);
        result?;

        self.seat(player_id, code.clone()).await;
        Ok(())
    }

    /// Rebinds a seated player to a new connection.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`]: the room is gone
    /// - [`RoomError::PlayerNotFound`]: the player has no seat there
    pub async fn rejoin(
        &mut self,
        code: &RoomCode,
        player_id: &PlayerId,
        connection: ConnectionId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let handle = self.handle(code)?;
        let result = handle.rejoin(player_id.clone(), connection, sender).await;
        self.reap_if_unavailable(&result);
        result?;

        self.seat(player_id.clone(), code.clone()).await;
        Ok(())
    }

    /// Removes a player from the room they sit in. A room whose host left
    /// is deleted.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the player isn't seated in
    /// the room named by `code`.
    pub async fn leave(&mut self, code: &RoomCode, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.player_rooms.get(player_id) != Some(code) {
            return Err(RoomError::PlayerNotFound(player_id.clone()));
        }
        self.leave_current(player_id).await;
        Ok(())
    }

    /// Forwards a gameplay action to the player's room.
    ///
    /// # Errors
    /// Returns [`RoomError::PlayerNotFound`] if the player isn't seated in
    /// the room named by `code`.
    pub async fn act(
        &mut self,
        code: &RoomCode,
        player_id: &PlayerId,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        if self.player_rooms.get(player_id) != Some(code) {
            return Err(RoomError::PlayerNotFound(player_id.clone()));
        }
        let handle = self.handle(code)?;
        let result = handle.act(player_id.clone(), action).await;
        self.reap_if_unavailable(&result);
        result
    }

    /// Tells the player's room their connection dropped. A player who sits
    /// nowhere is ignored.
    pub async fn disconnect(&mut self, player_id: &PlayerId, connection: ConnectionId) {
        let Some(code) = self.player_rooms.get(player_id).cloned() else {
            return;
        };
        if let Ok(handle) = self.handle(&code) {
            let result = handle.disconnect(player_id.clone(), connection).await;
            self.reap_if_unavailable(&result);
        }
    }

    /// Shuts a room down and unseats everyone in it. The room's countdown
    /// stops with its actor.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if there is no such room.
    pub async fn destroy(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        let _ = handle.shutdown().await;
        self.forget(code);
        Ok(())
    }

    pub async fn get_room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        self.rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?
            .get_info()
            .await
    }

    /// Returns the code of the room a player sits in, if any.
    pub fn player_room(&self, player_id: &PlayerId) -> Option<&RoomCode> {
        self.player_rooms.get(player_id)
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn catalog(&self) -> &LocationCatalog {
        &self.catalog
    }

    // -- Internals ---------------------------------------------------------

    fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Records that `player_id` now sits in `code`, leaving any other room
    /// first.
    async fn seat(&mut self, player_id: PlayerId, code: RoomCode) {
        if self.player_rooms.get(&player_id).is_some_and(|c| *c != code) {
            self.leave_current(&player_id).await;
        }
        self.player_rooms.insert(player_id, code);
    }

    async fn leave_current(&mut self, player_id: &PlayerId) {
        let Some(code) = self.player_rooms.remove(player_id) else {
            return;
        };
        let Ok(handle) = self.handle(&code) else {
            return;
        };
        match handle.leave(player_id.clone()).await {
            Ok(true) | Err(RoomError::Unavailable(_)) => self.forget(&code),
            Ok(false) => {}
            Err(error) => tracing::debug!(%code, %player_id, %error, "leave rejected"),
        }
    }

    /// Drops a room whose actor has stopped.
    fn reap_if_unavailable<T>(&mut self, result: &Result<T, RoomError>) {
        if let Err(RoomError::Unavailable(code)) = result {
            self.forget(code);
        }
    }

    fn forget(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_some() {
            self.player_rooms.retain(|_, c| c != code);
            tracing::info!(%code, rooms = self.rooms.len(), "room destroyed");
        }
    }
}
