//! GRIDBOT: Bitget spot grid-trading handler
//!
//! Entry point. Loads `.env` and configuration, initialises structured
//! logging, wires the Bitget client into the grid engine, and serves the
//! HTTP handler until Ctrl+C. Each request runs one pass over the
//! configured symbols; scheduling is left to whatever calls the endpoint.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use gridbot::config::{self, AppConfig, Credentials};
use gridbot::engine::{GridEngine, StateStore};
use gridbot::exchange::bitget::BitgetClient;
use gridbot::exchange::Exchange;
use gridbot::server::{self, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path =
        std::env::var("GRIDBOT_CONFIG").unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load_or_default(&config_path)?;

    let credentials = Credentials::from_env(&cfg.exchange);
    let exchange: Arc<dyn Exchange> = Arc::new(
        BitgetClient::new(&cfg.exchange.base_url, credentials)
            .context("Failed to build Bitget client")?,
    );

    info!(
        exchange = exchange.name(),
        base_url = %cfg.exchange.base_url,
        symbols = ?cfg.grid.symbols,
        grid_spacing = %cfg.grid.grid_spacing,
        lot_size = %cfg.grid.lot_size,
        "GRIDBOT starting up"
    );

    let engine = GridEngine::new(exchange, Arc::new(StateStore::new()), cfg.grid.clone());
    let state = Arc::new(ServerState::new(engine));

    server::serve(state, &cfg.server.host, cfg.server.port).await?;

    info!("GRIDBOT shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gridbot=info"));

    let json_logging = std::env::var("GRIDBOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
