//! uipm agent: serves host telemetry and USB/IP device state as JSON.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uipm_agent::config::AgentConfig;
use uipm_agent::exec::{CommandErrorLog, CommandGateway};
use uipm_agent::routes::router;
use uipm_agent::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uipm_agent=info")),
        )
        .init();

    let config = AgentConfig::load(std::env::args());
    let addr = config.addr;
    let gateway = CommandGateway::system(Arc::new(CommandErrorLog::new()));

    // No valid previous sample means no CPU delta; refuse to start.
    let state = AppState::new(config, gateway).context("failed to read initial CPU stat")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("uipm agent running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
