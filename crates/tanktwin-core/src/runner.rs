//! Periodic control loop and its start/stop lifecycle.
//!
//! [`run_control_loop`] calls [`Supervisor::tick`] once per period with a
//! fixed `dt`. Missed timer ticks are skipped, not replayed, so a stalled
//! process never fast-forwards the simulation, and a tick that overruns its
//! period restarts the schedule instead of triggering a catch-up tick.
//! Cancellation is observed while waiting for the next period and while a
//! tick is in flight. A tick cancelled after its state update only abandons
//! the pending store writes.
//!
//! [`SimulationController`] owns the spawned loop task and is what the HTTP
//! layer's start/stop/status endpoints talk to.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::supervisor::Supervisor;

/// Tick counters shared between the loop task and status readers.
#[derive(Debug, Default)]
pub struct LoopStats {
    ticks_completed: AtomicU64,
    ticks_failed: AtomicU64,
}

impl LoopStats {
    /// Ticks that returned `Ok`.
    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed.load(Ordering::Relaxed)
    }

    /// Ticks that returned an error.
    pub fn ticks_failed(&self) -> u64 {
        self.ticks_failed.load(Ordering::Relaxed)
    }
}

/// Tick `supervisor` every `period` until `cancel` fires.
///
/// A failed tick is logged and counted; it never ends the loop.
pub async fn run_control_loop(
    supervisor: Arc<Supervisor>,
    period: Duration,
    stats: Arc<LoopStats>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        dt_seconds = supervisor.settings().dt_seconds,
        "Control loop starting"
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = supervisor.tick() => result,
        };
        match result {
            Ok(_) => {
                let _ = stats.ticks_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                let _ = stats.ticks_failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "Tick failed; continuing");
            }
        }

        if started.elapsed() >= period {
            ticker.reset();
        }
    }

    info!(
        ticks_completed = stats.ticks_completed(),
        ticks_failed = stats.ticks_failed(),
        "Control loop stopped"
    );
}

// ---------------------------------------------------------------------------
// SimulationController
// ---------------------------------------------------------------------------

/// Outcome of a start or stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleOutcome {
    /// `false` if the loop was already in the requested state.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
}

impl LifecycleOutcome {
    fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_owned(),
        }
    }
}

/// Snapshot of the loop's lifecycle and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    /// Whether the loop task is running.
    pub running: bool,
    /// Successful ticks across all runs.
    pub ticks_completed: u64,
    /// Failed ticks across all runs.
    pub ticks_failed: u64,
    /// Store failures observed by the supervisor.
    pub persistence_failures: u64,
    /// When the current run started.
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock period between ticks.
    pub tick_interval_ms: u64,
    /// Simulated seconds per tick.
    pub dt_seconds: f64,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

/// Starts, stops, and reports on the control loop task.
pub struct SimulationController {
    supervisor: Arc<Supervisor>,
    period: Duration,
    stats: Arc<LoopStats>,
    running: Mutex<Option<RunningLoop>>,
}

impl SimulationController {
    /// Create a stopped controller ticking every `period` once started.
    pub fn new(supervisor: Arc<Supervisor>, period: Duration) -> Self {
        Self {
            supervisor,
            period,
            stats: Arc::new(LoopStats::default()),
            running: Mutex::new(None),
        }
    }

    /// Spawn the loop. Fails softly if it is already running.
    pub async fn start(&self) -> LifecycleOutcome {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return LifecycleOutcome::new(false, "Simulation already running");
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_control_loop(
            Arc::clone(&self.supervisor),
            self.period,
            Arc::clone(&self.stats),
            cancel.clone(),
        ));
        *running = Some(RunningLoop {
            cancel,
            handle,
            started_at: Utc::now(),
        });
        drop(running);

        self.system_log("Digital twin simulation started").await;
        LifecycleOutcome::new(true, "Simulation started")
    }

    /// Cancel the loop and wait for the task to exit.
    pub async fn stop(&self) -> LifecycleOutcome {
        let Some(run) = self.running.lock().await.take() else {
            return LifecycleOutcome::new(false, "Simulation not running");
        };

        run.cancel.cancel();
        if let Err(err) = run.handle.await {
            warn!(error = %err, "Control loop task ended abnormally");
        }

        self.system_log("Digital twin simulation stopped").await;
        LifecycleOutcome::new(true, "Simulation stopped")
    }

    /// Whether the loop task is running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Current lifecycle state and counters.
    pub async fn status(&self) -> SimulationStatus {
        let started_at = self.running.lock().await.as_ref().map(|r| r.started_at);
        SimulationStatus {
            running: started_at.is_some(),
            ticks_completed: self.stats.ticks_completed(),
            ticks_failed: self.stats.ticks_failed(),
            persistence_failures: self.supervisor.persistence_failures(),
            started_at,
            tick_interval_ms: u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX),
            dt_seconds: self.supervisor.settings().dt_seconds,
        }
    }

    async fn system_log(&self, message: &str) {
        if let Err(err) = self.supervisor.record_system_log(message).await {
            warn!(error = %err, "Failed to record system log entry");
        }
    }
}
