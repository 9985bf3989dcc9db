//! # Spyglass
//!
//! A real-time coordinator for a hidden-role party game. Players gather in
//! rooms keyed by a short code, the host tunes the round, and the server
//! deals roles, runs the clock, arbitrates guesses and accusation votes,
//! and keeps seats alive across reconnects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spyglass::prelude::*;
//!
//! # async fn run() -> Result<(), SpyglassError> {
//! let server = SpyglassServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build(OpaqueTokenAuth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::SpyglassError;
pub use server::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_PRUNE_INTERVAL, SpyglassServer, SpyglassServerBuilder,
};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{SpyglassError, SpyglassServer, SpyglassServerBuilder};
    pub use spyglass_protocol::{
        ClientEvent, Envelope, LocationCatalog, LocationPack, RoomCode, ServerEvent, SettingKey,
        Settings,
    };
    pub use spyglass_room::{RoomConfig, builtin_catalog, builtin_flat_catalog};
    pub use spyglass_session::{Authenticator, OpaqueTokenAuth, SessionConfig, SessionError};
    pub use spyglass_transport::ConnectionId;
}
