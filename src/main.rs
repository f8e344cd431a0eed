//! Racefeed — Entry Point
//!
//! Initializes configuration, logging, the live feed client and its
//! observers. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from RACEFEED_CONFIG) + env overrides + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Spawn LiveFeedClient over the WebSocket transport
//! 4. Spawn console observer
//! 5. Spawn health server (/live, /ready, /snapshot) if enabled
//! 6. Spawn Prometheus metrics server if enabled
//! 7. connect()
//! 8. Wait for SIGINT → broadcast shutdown → join tasks

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use racefeed::adapters::console::ConsoleObserver;
use racefeed::adapters::feeds::WsTransport;
use racefeed::adapters::metrics::{HealthServer, MetricsRegistry};
use racefeed::config::loader::{load_config, CONFIG_PATH_ENV};
use racefeed::usecases::LiveFeedClient;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let config = load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.feed.endpoint,
        "Starting racefeed"
    );

    // ── 3. Shutdown signal channel + feed client ────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let (client, client_handle) = LiveFeedClient::spawn(
        &config.feed,
        Arc::new(WsTransport::new()),
        shutdown_tx.subscribe(),
    );

    // ── 4. Console observer ─────────────────────────────────
    let observer_handle = tokio::spawn(
        ConsoleObserver::new(client.view()).run(shutdown_tx.subscribe()),
    );

    // ── 5. Health server ────────────────────────────────────
    let health_handle = config.health.enabled.then(|| {
        let server = HealthServer::new(client.view(), config.health.bind_address.clone());
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.run(shutdown_rx).await {
                error!(error = %e, "Health server failed");
            }
        })
    });

    // ── 6. Metrics server ───────────────────────────────────
    let metrics_handle = if config.metrics.enabled {
        let registry = Arc::new(
            MetricsRegistry::new(client.view()).context("Failed to create metrics registry")?,
        );
        let bind_address = config.metrics.bind_address.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = registry.serve(bind_address, shutdown_rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── 7. Connect ──────────────────────────────────────────
    client.connect();
    info!("All tasks spawned — feed client is running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(5), client_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), observer_handle).await;
    for handle in [health_handle, metrics_handle].into_iter().flatten() {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
