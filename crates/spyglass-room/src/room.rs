//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. The round countdown lives in the same task and is
//! polled in the same `select!` as the command channel, so a tick and a
//! client action can never interleave mid-handler.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use spyglass_protocol::{
    LocationCatalog, PlayerId, Recipient, RoomCode, ServerEvent, SettingKey,
};
use spyglass_tick::{Countdown, CountdownConfig, TickInfo};
use spyglass_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::state::{Arrival, Events};
use crate::{Room, RoomConfig, RoomError, RoomStatus};

/// Channel sender for delivering events to a player's connection handler.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// A gameplay request from a seated player. Fire-and-forget: a rejected
/// action is a silent no-op for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    UpdateSetting { key: SettingKey, value: i64 },
    ToggleLocation { location: String },
    TogglePack { pack_name: String, enable: bool },
    StartRound,
    Guess { location: String },
    StartVote { target: ConnectionId },
    SubmitVote { decision: bool },
    ReturnToLobby,
}

/// Commands sent to a room actor through its channel.
///
/// Variants with a `reply` expect an answer on that oneshot channel.
pub(crate) enum RoomCommand {
    /// Seat a player, or update an already seated durable id in place.
    Join {
        arrival: Arrival,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Rebind a seated player to a new connection.
    Rejoin {
        player_id: PlayerId,
        connection: ConnectionId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a player for good. Replies `true` if the room closed.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<bool, RoomError>>,
    },

    /// The player's connection dropped.
    Disconnect {
        player_id: PlayerId,
        connection: ConnectionId,
    },

    Action {
        player_id: PlayerId,
        action: RoomAction,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub status: RoomStatus,
    /// Seated players, online or not.
    pub player_count: usize,
    pub connected_count: usize,
    pub max_players: usize,
    pub rounds_started: u64,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(&self, arrival: Arrival, sender: PlayerSender) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            arrival,
            sender,
            reply,
        })
        .await?
    }

    pub async fn rejoin(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Rejoin {
            player_id,
            connection,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a player. Returns `true` if the room closed as a result.
    pub async fn leave(&self, player_id: PlayerId) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn disconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect {
            player_id,
            connection,
        })
        .await
    }

    pub async fn act(&self, player_id: PlayerId, action: RoomAction) -> Result<(), RoomError> {
        self.send(RoomCommand::Action { player_id, action }).await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// What woke the actor up.
enum Wake {
    Command(Option<RoomCommand>),
    Tick(TickInfo),
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    /// Per-player outbound channels.
    senders: HashMap<PlayerId, PlayerSender>,
    countdown: Countdown,
    /// The round the countdown was last armed for.
    armed_round: Option<u64>,
    /// Countdown time not yet charged to the round clock, always under
    /// one second.
    unbilled: Duration,
    rng: StdRng,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(code = %self.room.code(), "room actor started");

        loop {
            let wake = tokio::select! {
                command = self.receiver.recv() => Wake::Command(command),
                tick = self.countdown.wait_for_tick() => Wake::Tick(tick),
            };

            let flow = match wake {
                Wake::Command(Some(command)) => self.handle(command),
                Wake::Command(None) => ControlFlow::Break(()),
                Wake::Tick(tick) => {
                    self.on_tick(&tick);
                    ControlFlow::Continue(())
                }
            };
            if flow.is_break() {
                break;
            }
            self.sync_countdown();
        }

        self.countdown.cancel();
        tracing::info!(code = %self.room.code(), "room actor stopped");
    }

    fn handle(&mut self, command: RoomCommand) -> ControlFlow<()> {
        match command {
            RoomCommand::Join {
                arrival,
                sender,
                reply,
            } => {
                let player_id = arrival.player_id.clone();
                let result = self.room.join(arrival).map(|events| {
                    self.senders.insert(player_id, sender);
                    self.dispatch(events);
                });
                let _ = reply.send(result);
            }
            RoomCommand::Rejoin {
                player_id,
                connection,
                sender,
                reply,
            } => {
                let result = self.room.rejoin(&player_id, connection).map(|events| {
                    self.senders.insert(player_id, sender);
                    self.dispatch(events);
                });
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => match self.room.leave(&player_id) {
                Ok(departure) => {
                    self.senders.remove(&player_id);
                    self.dispatch(departure.events);
                    let _ = reply.send(Ok(departure.closed));
                    if departure.closed {
                        return ControlFlow::Break(());
                    }
                }
                Err(error) => {
                    let _ = reply.send(Err(error));
                }
            },
            RoomCommand::Disconnect {
                player_id,
                connection,
            } => match self.room.disconnect(&player_id, connection) {
                Ok(events) => self.dispatch(events),
                Err(error) => {
                    tracing::debug!(code = %self.room.code(), %player_id, %error, "disconnect ignored");
                }
            },
            RoomCommand::Action { player_id, action } => {
                match self.apply(&player_id, action) {
                    Ok(events) => self.dispatch(events),
                    Err(error) => tracing::debug!(
                        code = %self.room.code(),
                        %player_id,
                        %error,
                        "action rejected"
                    ),
                }
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(code = %self.room.code(), "room shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn apply(&mut self, player_id: &PlayerId, action: RoomAction) -> Result<Events, RoomError> {
        match action {
            RoomAction::UpdateSetting { key, value } => {
                self.room.update_setting(player_id, key, value)
            }
            RoomAction::ToggleLocation { location } => {
                self.room.toggle_location(player_id, &location)
            }
            RoomAction::TogglePack { pack_name, enable } => {
                self.room.toggle_pack(player_id, &pack_name, enable)
            }
            RoomAction::StartRound => self.room.start_round(player_id, &mut self.rng),
            RoomAction::Guess { location } => self.room.guess(player_id, &location),
            RoomAction::StartVote { target } => self.room.start_vote(player_id, target),
            RoomAction::SubmitVote { decision } => self.room.submit_vote(player_id, decision),
            RoomAction::ReturnToLobby => self.room.return_to_lobby(player_id),
        }
    }

    /// Charges the elapsed intervals to the round clock in whole seconds.
    fn on_tick(&mut self, tick: &TickInfo) {
        self.unbilled += self.countdown.tick_interval() * tick.elapsed;
        let secs = self.unbilled.as_secs();
        if secs == 0 {
            return;
        }
        self.unbilled -= Duration::from_secs(secs);
        let events = self.room.tick(u32::try_from(secs).unwrap_or(u32::MAX));
        self.dispatch(events);
    }

    /// Arms the countdown for every new round and cancels it as soon as
    /// the room leaves `playing`.
    fn sync_countdown(&mut self) {
        if self.room.status().is_active() {
            let round = self.room.rounds_started();
            if self.armed_round != Some(round) {
                self.countdown.arm();
                self.armed_round = Some(round);
                self.unbilled = Duration::ZERO;
            }
        } else {
            self.countdown.cancel();
        }
    }

    /// Delivers events to their recipients. Offline players are skipped;
    /// they catch up through the replay on rejoin.
    fn dispatch(&self, events: Events) {
        for (recipient, event) in events {
            match recipient {
                Recipient::Player(player_id) => self.send_to(&player_id, event),
                Recipient::All => {
                    for player in self.room.players() {
                        self.send_to(&player.id, event.clone());
                    }
                }
                Recipient::AllExcept(excluded) => {
                    for player in self.room.players().iter().filter(|p| p.id != excluded) {
                        self.send_to(&player.id, event.clone());
                    }
                }
            }
        }
    }

    fn send_to(&self, player_id: &PlayerId, event: ServerEvent) {
        let online = self.room.player(player_id).is_some_and(|p| p.connected);
        if !online {
            return;
        }
        let Some(sender) = self.senders.get(player_id) else {
            return;
        };
        if sender.send(event).is_err() {
            tracing::warn!(code = %self.room.code(), %player_id, "player channel closed, event dropped");
        }
    }

    fn info(&self) -> RoomInfo {
        let players = self.room.players();
        RoomInfo {
            code: self.room.code().clone(),
            status: self.room.status(),
            player_count: players.len(),
            connected_count: players.iter().filter(|p| p.connected).count(),
            max_players: self.room.max_players,
            rounds_started: self.room.rounds_started(),
        }
    }
}

/// Opens a room with `host` seated and spawns its actor.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
/// Returns [`RoomError::Invalid`] if the host's name is empty. Nothing is
/// spawned in that case.
pub(crate) fn spawn_room(
    code: RoomCode,
    catalog: Arc<LocationCatalog>,
    config: &RoomConfig,
    host: Arrival,
    sender: PlayerSender,
) -> Result<RoomHandle, RoomError> {
    let host_id = host.player_id.clone();
    let (room, events) = Room::open(code.clone(), catalog, config, host)?;
    let (tx, rx) = mpsc::channel(config.command_channel_size.max(1));

    let actor = RoomActor {
        room,
        senders: HashMap::from([(host_id, sender)]),
        countdown: Countdown::new(CountdownConfig::with_interval(config.tick_interval)),
        armed_round: None,
        unbilled: Duration::ZERO,
        rng: StdRng::from_os_rng(),
        receiver: rx,
    };
    actor.dispatch(events);

    tokio::spawn(actor.run());

    Ok(RoomHandle { code, sender: tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{arrival, conn, pid, test_catalog};

    fn spawn_test_room() -> (RoomHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let code = RoomCode::parse("ROOM").unwrap();
        let handle = spawn_room(
            code,
            test_catalog(),
            &RoomConfig::default(),
            arrival("host", 1, "Hana"),
            tx,
        )
        .unwrap();
        (handle, rx)
    }

    #[tokio::test]
    async fn test_spawn_room_welcomes_host() {
        let (_handle, mut rx) = spawn_test_room();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ServerEvent::Joined { is_host: true, .. }));
        assert!(matches!(rx.recv().await.unwrap(), ServerEvent::UpdatePlayers { .. }));
    }

    #[tokio::test]
    async fn test_spawn_room_empty_host_name_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = spawn_room(
            RoomCode::parse("ROOM").unwrap(),
            test_catalog(),
            &RoomConfig::default(),
            arrival("host", 1, "   "),
            tx,
        );
        assert!(matches!(result, Err(RoomError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_get_info_reports_seats() {
        let (handle, _rx) = spawn_test_room();
        let (tx, _guest_rx) = mpsc::unbounded_channel();
        handle.join(arrival("p2", 2, "Bo"), tx).await.unwrap();

        let info = handle.get_info().await.unwrap();

        assert_eq!(info.player_count, 2);
        assert_eq!(info.connected_count, 2);
        assert_eq!(info.status, RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_disconnect_then_info_counts_offline() {
        let (handle, _rx) = spawn_test_room();
        let (tx, _guest_rx) = mpsc::unbounded_channel();
        handle.join(arrival("p2", 2, "Bo"), tx).await.unwrap();

        handle.disconnect(pid("p2"), conn(2)).await.unwrap();
        let info = handle.get_info().await.unwrap();

        assert_eq!(info.player_count, 2, "offline players keep their seat");
        assert_eq!(info.connected_count, 1);
    }

    #[tokio::test]
    async fn test_shutdown_makes_handle_unavailable() {
        let (handle, _rx) = spawn_test_room();

        handle.shutdown().await.unwrap();
        let result = handle.get_info().await;

        assert!(matches!(result, Err(RoomError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_rejected_action_keeps_actor_running() {
        let (handle, _rx) = spawn_test_room();

        handle.act(pid("nobody"), RoomAction::StartRound).await.unwrap();
        let info = handle.get_info().await.unwrap();

        assert_eq!(info.status, RoomStatus::Lobby);
        assert_eq!(info.rounds_started, 0);
    }
}
