use std::time::Duration;

use clap::Parser;
use spyglass::prelude::*;

/// Spyglass party-game server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SPYGLASS_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Seats per room
    #[arg(long, env = "SPYGLASS_MAX_PLAYERS", default_value_t = 16)]
    max_players: usize,

    /// Close connections that send nothing for this long
    #[arg(long, env = "SPYGLASS_IDLE_TIMEOUT_SECS", default_value_t = 60)]
    idle_timeout_secs: u64,

    /// Use one flat location list instead of named packs
    #[arg(long, env = "SPYGLASS_FLAT_CATALOG")]
    flat_catalog: bool,
}

#[tokio::main]
async fn main() -> Result<(), SpyglassError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let catalog = if args.flat_catalog {
        builtin_flat_catalog()?
    } else {
        builtin_catalog()?
    };
    let room_config = RoomConfig {
        max_players: args.max_players,
        ..RoomConfig::default()
    };

    let server = SpyglassServer::builder()
        .bind(&args.bind)
        .room_config(room_config)
        .catalog(catalog)
        .idle_timeout(Duration::from_secs(args.idle_timeout_secs))
        .build(OpaqueTokenAuth)
        .await?;

    tracing::info!(
        addr = %server.local_addr()?,
        max_players = args.max_players,
        flat_catalog = args.flat_catalog,
        "starting"
    );
    server.run().await
}
