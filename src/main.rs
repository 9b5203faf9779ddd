mod fetch;
mod routes;
mod shutdown;
mod state;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use calfix_core::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::routes::calendar::CALENDAR_PATH;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    let state = AppState::new(&config).context("Failed to create upstream client")?;

    info!(
        upstream = %config.upstream_url,
        patches = ?state.pipeline.names(),
        "Starting calfix"
    );

    let app = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        "Serving iCal under http://localhost:{}{}",
        config.port, CALENDAR_PATH
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Set up the global tracing subscriber, filtered by `RUST_LOG`.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {e}"))
}
