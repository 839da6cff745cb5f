//! Engine binary for the water tank digital twin.
//!
//! Wires the supervisor, the storage backend, the control loop, and the
//! HTTP/WebSocket API together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tanktwin-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Open stores: `PostgreSQL` when a URL is configured, in-memory otherwise
//! 4. Build the supervisor and the event channel
//! 5. Start the API server
//! 6. Start the control loop if `simulation.auto_start` is set
//! 7. Wait for `Ctrl-C`, then stop the loop and drain the server

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tanktwin_core::config::TwinConfig;
use tanktwin_core::runner::SimulationController;
use tanktwin_core::sink::{BroadcastSink, EventSink};
use tanktwin_core::store::{AlertStore, HistoryStore, MemoryAlertStore, MemoryHistoryStore};
use tanktwin_core::supervisor::Supervisor;
use tanktwin_db::{PgAlertStore, PgHistoryStore, PostgresPool};
use tanktwin_observer::{AppState, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "tanktwin-config.yaml";

/// Storage handles chosen at startup.
struct Stores {
    history: Arc<dyn HistoryStore>,
    alerts: Arc<dyn AlertStore>,
    pool: Option<PostgresPool>,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, storage, or the server fails to
/// initialize.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = TwinConfig::load_or_default(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        tick_interval_ms = config.simulation.tick_interval_ms,
        dt_seconds = config.simulation.dt_seconds,
        max_capacity = config.tank.max_capacity,
        target_level = config.control.target_level,
        "tanktwin-engine starting"
    );

    // 3. Open stores.
    let stores = open_stores(&config).await?;

    // 4. Build the supervisor and event channel.
    let sink = Arc::new(BroadcastSink::new(config.simulation.event_channel_capacity));
    let supervisor = Arc::new(Supervisor::from_config(
        &config,
        Arc::clone(&stores.history),
        Arc::clone(&stores.alerts),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    )?);
    let simulation = Arc::new(SimulationController::new(
        Arc::clone(&supervisor),
        Duration::from_millis(config.simulation.tick_interval_ms),
    ));
    info!("Supervisor initialized");

    // 5. Start the API server.
    let shutdown = CancellationToken::new();
    let app_state = Arc::new(AppState::new(
        Arc::clone(&supervisor),
        Arc::clone(&simulation),
        sink.sender(),
    ));
    let server_config = ServerConfig::from(&config.infrastructure);
    let observer =
        tanktwin_observer::spawn_observer(&server_config, app_state, shutdown.clone()).await?;
    info!(addr = %observer.addr, "API server started");

    // 6. Start the control loop.
    if config.simulation.auto_start {
        let outcome = simulation.start().await;
        info!(result = %outcome.message, "Control loop auto-started");
    } else {
        info!("Control loop idle until POST /api/simulation/start");
    }

    // 7. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let outcome = simulation.stop().await;
    info!(result = %outcome.message, "Control loop stopped");

    shutdown.cancel();
    if let Err(e) = observer.task.await {
        warn!(error = %e, "API server task ended abnormally");
    }

    if let Some(pool) = stores.pool {
        pool.close().await;
    }

    let status = simulation.status().await;
    info!(
        ticks_completed = status.ticks_completed,
        ticks_failed = status.ticks_failed,
        persistence_failures = status.persistence_failures,
        "tanktwin-engine shutdown complete"
    );

    Ok(())
}

/// Pick the storage backend from `infrastructure.postgres_url`.
async fn open_stores(config: &TwinConfig) -> Result<Stores, EngineError> {
    if let Some(url) = config.infrastructure.postgres_url.as_deref() {
        info!("Connecting to PostgreSQL");
        let pool = PostgresPool::connect_and_migrate(url).await?;
        return Ok(Stores {
            history: Arc::new(PgHistoryStore::new(pool.pool().clone())),
            alerts: Arc::new(PgAlertStore::new(pool.pool().clone())),
            pool: Some(pool),
        });
    }

    info!("No database configured, using in-memory stores");
    Ok(Stores {
        history: Arc::new(MemoryHistoryStore::default()),
        alerts: Arc::new(MemoryAlertStore::new()),
        pool: None,
    })
}
