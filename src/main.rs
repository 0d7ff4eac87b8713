//! Movement Sync Server - authoritative movement synchronization
//!
//! Entry point. It handles:
//! - WebSocket sessions carrying bit-packed movement frames
//! - The partition task that owns every mover and runs the tick
//! - HTTP endpoints for health and actor snapshots

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movement_sync::app::AppState;
use movement_sync::config::Config;
use movement_sync::http::build_router;
use movement_sync::util::time::init_server_time;
use movement_sync::world::PartitionRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Movement Sync Server");
    info!("Server address: {}", config.server_addr);
    info!(
        tick_rate = config.movement.tick_rate,
        patrols = config.movement.patrol_actors,
        seed = config.movement.seed,
        "Movement settings"
    );

    // Spawn the partition task
    let (runner, partition) = PartitionRunner::new(config.movement.clone());
    let partition_task = tokio::spawn(runner.run());

    // Build router
    let state = AppState::new(config.clone(), partition);
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // upgraded sessions may still hold handles; do not wait on them forever
    if tokio::time::timeout(Duration::from_secs(2), partition_task)
        .await
        .is_err()
    {
        info!("Partition still referenced by open sessions, exiting anyway");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
