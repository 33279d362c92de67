//! `acp-server` binary.

use std::sync::Arc;

use acp::Verifier;
use acp_server::{AppState, Config, ServerError, router, spawn_pruners};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::parse();
    let institution_key = config.institution_key()?;
    let registry = config.load_registry()?;

    let state = Arc::new(
        AppState::new(institution_key, registry)
            .with_verifier(Verifier::new().with_clock_skew(config.clock_skew_secs)),
    );
    let pruners = spawn_pruners(&state, config.prune_interval());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, agents = state.registry.len(), "acp-server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruners.abort();
    tracing::info!("acp-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
