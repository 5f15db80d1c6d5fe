//! `watchparty` binary: runs a server configured from the environment.
//!
//! - `WATCHPARTY_BIND`: listen address (default `127.0.0.1:8080`)
//! - `WATCHPARTY_HISTORY_LIMIT`: chat messages replayed to late joiners
//! - `RUST_LOG`: log filter (default `info`)

use watchparty::prelude::*;

struct Config {
    bind: String,
    room: RoomConfig,
}

fn config_from_env() -> Config {
    let bind = std::env::var("WATCHPARTY_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let defaults = RoomConfig::default();
    let history_limit = std::env::var("WATCHPARTY_HISTORY_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.history_limit);

    Config {
        bind,
        room: RoomConfig {
            history_limit,
            ..defaults
        },
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let config = config_from_env();
    tracing::info!(bind = %config.bind, history_limit = config.room.history_limit, "starting");

    let server = match WatchPartyServer::builder()
        .bind(&config.bind)
        .room_config(config.room)
        .build()
        .await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
