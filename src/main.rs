//! Pulse relay - binary entry point

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use pulse_sync::config::RelayConfig;
use pulse_sync::relay::{batcher::UpdateBatcher, heartbeat, http::create_router, publisher, state::RelayState};

#[tokio::main]
async fn main() -> pulse_sync::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env();
    let state = Arc::new(RelayState::new(config.broadcast_capacity));

    // Wire the global publisher into the batcher's ingest channel
    let (updates_tx, updates_rx) = mpsc::channel(1024);
    publisher::init_publisher(updates_tx);
    tokio::spawn(
        UpdateBatcher::new(Arc::clone(&state), config.flush_interval, config.max_batch_size)
            .run(updates_rx),
    );

    tokio::spawn(heartbeat::run(Arc::clone(&state), config.heartbeat_interval));

    let app = create_router(Arc::clone(&state));
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "pulse relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("pulse relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
    }
}
