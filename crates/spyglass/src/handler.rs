//! Per-connection handler: identity binding and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's outbox. The flow is:
//!   1. Spawn the writer; rooms deliver into the outbox from then on
//!   2. Loop: receive envelopes → route by event type
//!   3. On close or idle timeout, mark the player offline

use std::sync::Arc;

use spyglass_protocol::{ClientEvent, Codec, Envelope, PlayerId, RoomCode, ServerEvent};
use spyglass_room::{Arrival, PlayerSender, RoomAction, RoomError};
use spyglass_session::Authenticator;
use spyglass_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::SpyglassError;
use crate::server::ServerState;

/// Drop guard that marks the connection's player offline when the handler
/// exits, even if it panicked. `Drop` is synchronous, so the async cleanup
/// runs in a fire-and-forget task.
struct SessionGuard<A: Authenticator, C: Codec> {
    connection: ConnectionId,
    state: Arc<ServerState<A, C>>,
}

impl<A: Authenticator, C: Codec> Drop for SessionGuard<A, C> {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let disconnected = state.sessions.lock().await.disconnect(connection);
            // Unbound or displaced connections speak for nobody.
            let Ok(player_id) = disconnected else {
                return;
            };
            state.rooms.lock().await.disconnect(&player_id, connection).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), SpyglassError>
where
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::new(conn);
    let connection = conn.id();
    tracing::debug!(%connection, "handling new connection");

    let (outbox, inbox) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbox(Arc::clone(&conn), inbox, Arc::clone(&state)));
    let _guard = SessionGuard {
        connection,
        state: Arc::clone(&state),
    };

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::debug!(%connection, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%connection, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%connection, "idle connection timed out");
                break;
            }
        };

        let envelope: Envelope<ClientEvent> = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%connection, error = %e, "failed to decode envelope");
                send_error(&outbox, format!("malformed event: {e}"));
                continue;
            }
        };

        handle_event(&state, connection, &outbox, envelope.payload).await;
    }

    // Rooms may still hold clones of the outbox, so the writer won't see
    // the channel close on its own.
    writer.abort();
    let _ = conn.close().await;
    Ok(())
}

/// Wraps outbound events in envelopes and writes them to the socket.
async fn write_outbox<A, C>(
    conn: Arc<WebSocketConnection>,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<A, C>>,
) where
    A: Authenticator,
    C: Codec,
{
    let mut seq: u64 = 1;
    while let Some(event) = inbox.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), state.server_time(), event);
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(connection = %conn.id(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(connection = %conn.id(), error = %e, "send failed, writer stopping");
            break;
        }
    }
}

async fn handle_event<A, C>(
    state: &ServerState<A, C>,
    connection: ConnectionId,
    outbox: &PlayerSender,
    event: ClientEvent,
) where
    A: Authenticator,
    C: Codec,
{
    match event {
        ClientEvent::Heartbeat { client_time } => {
            let _ = outbox.send(ServerEvent::HeartbeatAck {
                client_time,
                server_time: state.server_time(),
            });
        }

        ClientEvent::CreateGame { name, durable_id } => {
            let Some(player_id) = authenticate(state, connection, outbox, &durable_id).await
            else {
                return;
            };
            let arrival = Arrival {
                player_id: player_id.clone(),
                connection,
                name,
            };
            let result = state.rooms.lock().await.create(arrival, outbox.clone()).await;
            match result {
                Ok(_) => bind(state, connection, player_id).await,
                Err(e) => {
                    tracing::debug!(%connection, error = %e, "create rejected");
                    send_error(outbox, e.to_string());
                }
            }
        }

        ClientEvent::JoinGame {
            code,
            name,
            durable_id,
        } => {
            let Some(player_id) = authenticate(state, connection, outbox, &durable_id).await
            else {
                return;
            };
            let arrival = Arrival {
                player_id: player_id.clone(),
                connection,
                name,
            };
            let result = state
                .rooms
                .lock()
                .await
                .join(&code, arrival, outbox.clone())
                .await;
            match result {
                Ok(()) => bind(state, connection, player_id).await,
                Err(e) => {
                    tracing::debug!(%connection, %code, error = %e, "join rejected");
                    send_error(outbox, e.to_string());
                }
            }
        }

        ClientEvent::RejoinGame { code, durable_id } => {
            let Some(player_id) = authenticate(state, connection, outbox, &durable_id).await
            else {
                return;
            };
            let result = state
                .rooms
                .lock()
                .await
                .rejoin(&code, &player_id, connection, outbox.clone())
                .await;
            match result {
                Ok(()) => bind(state, connection, player_id).await,
                Err(RoomError::NotFound(_) | RoomError::PlayerNotFound(_)) => {
                    tracing::debug!(%connection, %code, "rejoin to a seat that no longer exists");
                    let _ = outbox.send(ServerEvent::SessionExpired);
                }
                Err(e) => send_error(outbox, e.to_string()),
            }
        }

        event => act(state, connection, outbox, event).await,
    }
}

/// Checks a durable id. Nothing is bound yet: a rejected create or join
/// must leave the player's current connection in charge.
async fn authenticate<A, C>(
    state: &ServerState<A, C>,
    connection: ConnectionId,
    outbox: &PlayerSender,
    durable_id: &str,
) -> Option<PlayerId>
where
    A: Authenticator,
    C: Codec,
{
    match state.auth.authenticate(durable_id).await {
        Ok(player_id) => Some(player_id),
        Err(e) => {
            tracing::debug!(%connection, error = %e, "identity rejected");
            send_error(outbox, e.to_string());
            None
        }
    }
}

/// Makes this connection speak for `player_id` once a room has seated
/// them. A player this connection spoke for before is marked offline.
async fn bind<A, C>(state: &ServerState<A, C>, connection: ConnectionId, player_id: PlayerId)
where
    A: Authenticator,
    C: Codec,
{
    let binding = state.sessions.lock().await.bind(player_id, connection);
    if let Some(previous) = binding.previous_player {
        state.rooms.lock().await.disconnect(&previous, connection).await;
    }
}

/// Routes an in-room event from whoever this connection speaks for.
async fn act<A, C>(
    state: &ServerState<A, C>,
    connection: ConnectionId,
    outbox: &PlayerSender,
    event: ClientEvent,
) where
    A: Authenticator,
    C: Codec,
{
    let identified = state.sessions.lock().await.identify(connection).cloned();
    let Some(player_id) = identified else {
        tracing::debug!(%connection, "event from an unbound connection ignored");
        return;
    };

    let result = match event {
        ClientEvent::LeaveGame { code } => state.rooms.lock().await.leave(&code, &player_id).await,
        event => {
            let Some((code, action)) = room_action(event) else {
                return;
            };
            state
                .rooms
                .lock()
                .await
                .act(&code, &player_id, action)
                .await
        }
    };

    match result {
        Ok(()) => {}
        Err(e) if e.is_reportable() => send_error(outbox, e.to_string()),
        Err(e) => tracing::debug!(%connection, %player_id, error = %e, "event ignored"),
    }
}

/// Maps a gameplay event onto the room action it requests.
fn room_action(event: ClientEvent) -> Option<(RoomCode, RoomAction)> {
    let routed = match event {
        ClientEvent::UpdateSettings { code, key, value } => {
            (code, RoomAction::UpdateSetting { key, value })
        }
        ClientEvent::ToggleLocation { code, location } => {
            (code, RoomAction::ToggleLocation { location })
        }
        ClientEvent::TogglePack {
            code,
            pack_name,
            enable,
        } => (code, RoomAction::TogglePack { pack_name, enable }),
        ClientEvent::StartGame { code } => (code, RoomAction::StartRound),
        ClientEvent::SpyGuess { code, location } => (code, RoomAction::Guess { location }),
        ClientEvent::StartVote {
            code,
            target_connection_id,
        } => (
            code,
            RoomAction::StartVote {
                target: target_connection_id,
            },
        ),
        ClientEvent::SubmitVote { code, decision } => (code, RoomAction::SubmitVote { decision }),
        ClientEvent::ReturnToLobby { code } => (code, RoomAction::ReturnToLobby),
        ClientEvent::CreateGame { .. }
        | ClientEvent::JoinGame { .. }
        | ClientEvent::RejoinGame { .. }
        | ClientEvent::LeaveGame { .. }
        | ClientEvent::Heartbeat { .. } => return None,
    };
    Some(routed)
}

fn send_error(outbox: &PlayerSender, message: String) {
    let _ = outbox.send(ServerEvent::Error { message });
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
