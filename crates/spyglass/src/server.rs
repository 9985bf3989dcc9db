//! `SpyglassServer` builder and server loop.
//!
//! This is the entry point for running a Spyglass server. It ties together
//! all the layers: transport → protocol → session → room.

use std::sync::Arc;
use std::time::{Duration, Instant};

use spyglass_protocol::{Codec, JsonCodec, LocationCatalog};
use spyglass_room::{RoomConfig, RoomManager, builtin_catalog};
use spyglass_session::{Authenticator, OpaqueTokenAuth, SessionConfig, SessionManager};
use spyglass_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::SpyglassError;
use crate::handler::handle_connection;

/// How long a connection may stay silent before it is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often stale sessions are pruned.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared server state passed to each connection handler task.
///
/// The room registry is owned here and reached only through the mutex.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    started: Instant,
}

impl<A: Authenticator, C: Codec> ServerState<A, C> {
    /// Milliseconds since the server started.
    pub(crate) fn server_time(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a Spyglass server.
///
/// # Example
///
/// ```rust,no_run
/// use spyglass::prelude::*;
///
/// # async fn run() -> Result<(), SpyglassError> {
/// let server = SpyglassServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(OpaqueTokenAuth)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct SpyglassServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    session_config: SessionConfig,
    catalog: Option<LocationCatalog>,
    idle_timeout: Duration,
    prune_interval: Duration,
}

impl SpyglassServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            room_config: RoomConfig::default(),
            session_config: SessionConfig::default(),
            catalog: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the location catalog every room is created with. Defaults to
    /// the built-in pack catalog.
    pub fn catalog(mut self, catalog: LocationCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval;
        self
    }

    /// Binds the listener and builds the server with the given
    /// authenticator, using [`JsonCodec`] on the wire.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<SpyglassServer<A, JsonCodec>, SpyglassError> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => builtin_catalog()?,
        };
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            rooms: Mutex::new(RoomManager::new(catalog, self.room_config)),
            auth,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            started: Instant::now(),
        });

        Ok(SpyglassServer {
            transport,
            state,
            prune_interval: self.prune_interval.max(Duration::from_millis(1)),
        })
    }
}

impl Default for SpyglassServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Spyglass server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SpyglassServer<A: Authenticator = OpaqueTokenAuth, C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
    prune_interval: Duration,
}

impl SpyglassServer {
    /// Creates a new builder.
    pub fn builder() -> SpyglassServerBuilder {
        SpyglassServerBuilder::new()
    }
}

impl<A, C> SpyglassServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, SpyglassError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop and the session housekeeping task. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), SpyglassError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Spyglass server running");

        tokio::spawn(prune_sessions(Arc::clone(&self.state), self.prune_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Forgets identities that have been offline longer than the retention
/// window. Their room seats are untouched: a later rejoin binds afresh.
async fn prune_sessions<A: Authenticator, C: Codec>(
    state: Arc<ServerState<A, C>>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let pruned = state.sessions.lock().await.prune();
        if !pruned.is_empty() {
            tracing::info!(count = pruned.len(), "pruned offline sessions");
        }
    }
}
