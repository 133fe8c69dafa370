//! Temperature/humidity monitor server.
//!
//! Usage:
//!   climate-server --port 3000 --redis-url redis://127.0.0.1/

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use climate_core::{Clock, SystemClock};
use climate_live::Monitor;
use climate_server::{router, AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = ServerConfig::parse();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backend = config.build_backend(clock)?;
    info!(
        backend = backend.name(),
        device = backend.device_id(),
        capacity = config.capacity,
        "storage ready"
    );

    let monitor = Arc::new(Monitor::new(backend));
    let watchdog = config.watchdog();
    let watchdog_task = watchdog.spawn(monitor.clone());

    let public_dir = config.public_dir.is_dir().then_some(config.public_dir.as_path());
    if public_dir.is_none() {
        warn!(dir = %config.public_dir.display(), "public directory missing, UI disabled");
    }
    let app = router(AppState::new(monitor, config.subscriber_buffer), public_dir);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("climate server listening on http://{addr}");
    info!("  POST /api/data          - sensor ingestion (JSON or form)");
    info!("  GET  /api/current       - current reading and stats");
    info!("  GET  /api/history       - recent readings (?limit=N)");
    info!("  GET  /api/stats         - running statistics");
    info!("  POST /api/clear         - clear history and stats");
    info!("  GET  /api/export/csv    - CSV export");
    info!("  GET  /api/export/json   - JSON export");
    info!("  GET  /api/devices       - latest snapshot per device");
    info!("  GET  /ws                - live updates");
    info!(
        period_secs = watchdog.period.as_secs(),
        threshold_secs = watchdog.threshold.as_secs(),
        "watchdog running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    watchdog_task.abort();
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
