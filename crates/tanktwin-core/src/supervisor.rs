//! The twin supervisor: sole owner of the mutable tank state.
//!
//! Every mutation (operator commands and the periodic tick) runs under one
//! async mutex whose acquisition is bounded by a timeout. The critical
//! section never performs I/O. Events are published before the guard is
//! dropped, so subscribers see snapshots in the order they were committed;
//! persistence happens afterwards from a copy taken inside the section.
//!
//! # Tick sequence
//!
//! 1. Physics advances the state by the fixed `dt`.
//! 2. The new snapshot is appended to the in-memory history.
//! 3. Alert rules are evaluated against the snapshot.
//! 4. In auto mode, the decision engine runs and its action is applied.
//! 5. `tank_update`, `alert`, and `ai_log` events are published.
//! 6. The lock is released and the reading and alerts are persisted, bounded
//!    by [`SupervisorSettings::persist_timeout`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use tanktwin_types::{
    AlertId, AlertRecord, Anomaly, ControlConfig, Decision, DecisionLogEntry, DecisionLogKind,
    MAX_FLOW_RATE_LPM, MIN_FLOW_RATE_LPM, TankAction, TankConfig, TankState, TrendPrediction,
    TwinEvent,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::alerts;
use crate::config::{ConfigError, SimulationSettings, TwinConfig};
use crate::decision;
use crate::diagnostics::{self, DiagnosticsConstants, DiagnosticsReport};
use crate::history::{HistoryBuffer, RingBuffer};
use crate::physics::{PhysicsConstants, PhysicsEngine};
use crate::sink::EventSink;
use crate::store::{AlertQuery, AlertStore, HistoryStore, StoreError};

/// Errors returned by supervisor operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// A numeric input could not be clamped into range (NaN or infinite).
    #[error("{field} must be a finite number, got {value}")]
    ValidationOutOfRange {
        /// Name of the rejected input.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// No alert with this id exists.
    #[error("alert {id} not found")]
    NotFound {
        /// The unknown id.
        id: AlertId,
    },

    /// A store call made on behalf of a command failed.
    #[error("persistence failed: {source}")]
    Persistence {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The state lock could not be acquired in time.
    #[error("timed out after {waited_ms} ms waiting for the state lock ({operation})")]
    ConcurrencyTimeout {
        /// The operation that gave up.
        operation: &'static str,
        /// How long it waited.
        waited_ms: u64,
    },
}

/// Runtime knobs of a [`Supervisor`].
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorSettings {
    /// Simulated seconds applied per tick.
    pub dt_seconds: f64,
    /// Upper bound on state lock acquisition.
    pub lock_timeout: Duration,
    /// Upper bound on the store writes made by one tick.
    ///
    /// Writes still pending at the deadline are abandoned and counted as
    /// persistence failures.
    pub persist_timeout: Duration,
    /// Snapshots kept in the in-memory history.
    pub history_capacity: usize,
    /// Entries kept in the decision log.
    pub decision_log_capacity: usize,
    /// Seed for the physics noise source; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl SupervisorSettings {
    /// Derive settings from the `simulation` configuration section.
    pub fn from_simulation(simulation: &SimulationSettings) -> Self {
        Self {
            dt_seconds: simulation.dt_seconds,
            lock_timeout: Duration::from_millis(simulation.lock_timeout_ms),
            persist_timeout: Duration::from_millis(simulation.tick_interval_ms),
            history_capacity: simulation.history_capacity,
            decision_log_capacity: simulation.decision_log_capacity,
            seed: simulation.seed,
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_simulation(&SimulationSettings::default())
    }
}

/// Result of a mutating command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    /// Whether the command took effect.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// State right after the command.
    pub state: TankState,
    /// Control settings right after the command.
    #[serde(skip)]
    pub control: ControlConfig,
}

/// Partial update of the control settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigUpdate {
    /// New target level, clamped to `0..=100`.
    pub target_level: Option<f64>,
    /// New flow rate, clamped to the pump limits.
    pub flow_rate: Option<f64>,
}

/// Control settings after an [`Supervisor::update_config`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigOutcome {
    /// Current control settings.
    pub control: ControlConfig,
    /// Current pump flow rate in L/min.
    pub flow_rate: f64,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// State after the tick, decision applied.
    pub state: TankState,
    /// Alerts raised by this tick.
    pub alerts: Vec<AlertRecord>,
    /// Controller verdict, when auto mode was on.
    pub decision: Option<Decision>,
    /// Store calls that failed during this tick.
    pub persistence_failures: u32,
}

/// Mutable state guarded by the supervisor lock.
pub(crate) struct TwinCore {
    state: TankState,
    control: ControlConfig,
    history: HistoryBuffer,
    log: RingBuffer<DecisionLogEntry>,
    rng: SmallRng,
}

impl TwinCore {
    fn push_log(&mut self, entry: DecisionLogEntry) {
        let _ = self.log.push(entry);
    }
}

/// Owns the tank state and serializes every operation on it.
///
/// Construct once and share through [`Arc`] with the control loop and the
/// HTTP handlers.
pub struct Supervisor {
    core: Mutex<TwinCore>,
    tank: TankConfig,
    physics: PhysicsEngine,
    diagnostics: DiagnosticsConstants,
    settings: SupervisorSettings,
    history_store: Arc<dyn HistoryStore>,
    alert_store: Arc<dyn AlertStore>,
    sink: Arc<dyn EventSink>,
    persistence_failures: AtomicU64,
}

impl Supervisor {
    /// Build a supervisor from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration fails validation.
    pub fn from_config(
        config: &TwinConfig,
        history_store: Arc<dyn HistoryStore>,
        alert_store: Arc<dyn AlertStore>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            config.tank.clone(),
            config.control.clone(),
            SupervisorSettings::from_simulation(&config.simulation),
            history_store,
            alert_store,
            sink,
        ))
    }

    /// Build a supervisor from already-validated parts.
    pub fn new(
        tank: TankConfig,
        control: ControlConfig,
        settings: SupervisorSettings,
        history_store: Arc<dyn HistoryStore>,
        alert_store: Arc<dyn AlertStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let rng = settings
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        let core = TwinCore {
            state: TankState::initial(&tank, Utc::now()),
            control,
            history: HistoryBuffer::new(settings.history_capacity),
            log: RingBuffer::new(settings.decision_log_capacity),
            rng,
        };
        Self {
            core: Mutex::new(core),
            tank,
            physics: PhysicsEngine::new(PhysicsConstants::default()),
            diagnostics: DiagnosticsConstants::default(),
            settings,
            history_store,
            alert_store,
            sink,
            persistence_failures: AtomicU64::new(0),
        }
    }

    /// The tank description this twin models.
    pub const fn tank(&self) -> &TankConfig {
        &self.tank
    }

    /// The settings this supervisor runs with.
    pub const fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// The state lock itself, for holding it across loop periods in tests.
    #[cfg(test)]
    pub(crate) const fn state_lock(&self) -> &Mutex<TwinCore> {
        &self.core
    }

    /// Total store failures observed during ticks since construction.
    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    async fn lock(
        &self,
        operation: &'static str,
    ) -> Result<MutexGuard<'_, TwinCore>, SupervisorError> {
        match tokio::time::timeout(self.settings.lock_timeout, self.core.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_elapsed) => {
                let waited_ms =
                    u64::try_from(self.settings.lock_timeout.as_millis()).unwrap_or(u64::MAX);
                error!(operation, waited_ms, "Timed out waiting for the state lock");
                Err(SupervisorError::ConcurrencyTimeout {
                    operation,
                    waited_ms,
                })
            }
        }
    }

    /// Run `apply` and publish the resulting state under the lock.
    async fn command<F>(
        &self,
        operation: &'static str,
        apply: F,
    ) -> Result<CommandOutcome, SupervisorError>
    where
        F: FnOnce(&mut TwinCore) -> String + Send,
    {
        let (message, state, control) = {
            let mut core = self.lock(operation).await?;
            let message = apply(&mut *core);
            let state = core.state.clone();
            self.sink.publish(TwinEvent::TankUpdate(state.clone()));
            (message, state, core.control.clone())
        };
        info!(operation, %message, "Command applied");
        Ok(CommandOutcome {
            success: true,
            message,
            state,
            control,
        })
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the twin by one fixed step.
    ///
    /// Store failures and writes still pending after `persist_timeout` are
    /// logged and counted but do not fail the tick.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ConcurrencyTimeout`] if the lock could not
    /// be acquired.
    pub async fn tick(&self) -> Result<TickReport, SupervisorError> {
        let now = Utc::now();
        let (state, raised, decision) = {
            let mut guard = self.lock("tick").await?;
            let core = &mut *guard;
            core.state = self.physics.update(
                &core.state,
                &self.tank,
                self.settings.dt_seconds,
                &mut core.rng,
                now,
            );
            let _ = core.history.push(core.state.clone());
            let raised = alerts::evaluate(&core.state, now);

            let mut logs = Vec::new();
            let decision = if core.control.auto_mode {
                let decision = decision::analyze(&core.state, &core.history, &core.control);
                apply_action(&mut core.state, decision.action);
                if let Some(entry) = decision.log_entry(now) {
                    core.push_log(entry.clone());
                    logs.push(entry);
                }
                Some(decision)
            } else {
                None
            };

            let state = core.state.clone();
            self.sink.publish(TwinEvent::TankUpdate(state.clone()));
            for alert in &raised {
                self.sink.publish(TwinEvent::Alert(alert.clone()));
            }
            for entry in logs {
                self.sink.publish(TwinEvent::AiLog(entry));
            }
            (state, raised, decision)
        };

        let failures = self.persist_bounded(&state, &raised).await;

        debug!(
            level = state.water_level,
            filling = state.is_filling,
            draining = state.is_draining,
            alerts = raised.len(),
            action = decision.as_ref().map(|d| d.action.as_str()),
            "Tick complete"
        );

        Ok(TickReport {
            state,
            alerts: raised,
            decision,
            persistence_failures: failures,
        })
    }

    /// [`Self::persist`] with the configured deadline applied.
    ///
    /// On timeout every write of the tick counts as failed, since which of
    /// them landed is unknown.
    async fn persist_bounded(&self, state: &TankState, raised: &[AlertRecord]) -> u32 {
        let timeout = self.settings.persist_timeout;
        if let Ok(failures) = tokio::time::timeout(timeout, self.persist(state, raised)).await {
            return failures;
        }
        let writes = u32::try_from(raised.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        warn!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            writes, "Persistence timed out; tick writes abandoned"
        );
        let _ = self
            .persistence_failures
            .fetch_add(u64::from(writes), Ordering::Relaxed);
        writes
    }

    /// Write a reading and its alerts, returning how many writes failed.
    async fn persist(&self, state: &TankState, raised: &[AlertRecord]) -> u32 {
        let mut failures: u32 = 0;
        if let Err(err) = self.history_store.append(state).await {
            warn!(error = %err, "Failed to persist tank reading");
            failures = failures.saturating_add(1);
        }
        for alert in raised {
            warn!(
                kind = alert.kind.as_str(),
                severity = alert.severity.as_str(),
                message = %alert.message,
                "Alert raised"
            );
            if let Err(err) = self.alert_store.append(alert).await {
                warn!(error = %err, alert_id = %alert.id, "Failed to persist alert");
                failures = failures.saturating_add(1);
            }
        }
        if failures > 0 {
            let _ = self
                .persistence_failures
                .fetch_add(u64::from(failures), Ordering::Relaxed);
        }
        failures
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start or stop filling. Starting a fill stops any drain.
    pub async fn set_fill(&self, on: bool) -> Result<CommandOutcome, SupervisorError> {
        self.command("set_fill", move |core| {
            core.state.is_filling = on;
            if on {
                core.state.is_draining = false;
                "Filling started".to_owned()
            } else {
                "Filling stopped".to_owned()
            }
        })
        .await
    }

    /// Start or stop draining. Starting a drain stops any fill.
    pub async fn set_drain(&self, on: bool) -> Result<CommandOutcome, SupervisorError> {
        self.command("set_drain", move |core| {
            core.state.is_draining = on;
            if on {
                core.state.is_filling = false;
                "Draining started".to_owned()
            } else {
                "Draining stopped".to_owned()
            }
        })
        .await
    }

    /// Stop filling and draining.
    pub async fn stop(&self) -> Result<CommandOutcome, SupervisorError> {
        self.command("stop", |core| {
            apply_action(&mut core.state, TankAction::Stop);
            "All operations stopped".to_owned()
        })
        .await
    }

    /// Set the pump flow rate, clamped to the pump limits.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ValidationOutOfRange`] for NaN or infinity.
    pub async fn set_flow_rate(&self, rate: f64) -> Result<CommandOutcome, SupervisorError> {
        let rate = clamp_finite("flow_rate", rate, MIN_FLOW_RATE_LPM, MAX_FLOW_RATE_LPM)?;
        self.command("set_flow_rate", move |core| {
            core.state.flow_rate = rate;
            format!("Flow rate set to {rate:.1} L/min")
        })
        .await
    }

    /// Set the target level, clamped to `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ValidationOutOfRange`] for NaN or infinity.
    pub async fn set_target(&self, level: f64) -> Result<CommandOutcome, SupervisorError> {
        let level = clamp_finite("target_level", level, 0.0, 100.0)?;
        self.command("set_target", move |core| {
            core.control.target_level = level;
            format!("Target level set to {level:.1}%")
        })
        .await
    }

    /// Apply a target and/or flow rate change atomically.
    ///
    /// Both inputs are checked before either is applied.
    pub async fn update_config(
        &self,
        update: ConfigUpdate,
    ) -> Result<ConfigOutcome, SupervisorError> {
        let target = update
            .target_level
            .map(|v| clamp_finite("target_level", v, 0.0, 100.0))
            .transpose()?;
        let rate = update
            .flow_rate
            .map(|v| clamp_finite("flow_rate", v, MIN_FLOW_RATE_LPM, MAX_FLOW_RATE_LPM))
            .transpose()?;

        let outcome = {
            let mut core = self.lock("update_config").await?;
            if let Some(target) = target {
                core.control.target_level = target;
            }
            if let Some(rate) = rate {
                core.state.flow_rate = rate;
            }
            self.sink.publish(TwinEvent::TankUpdate(core.state.clone()));
            ConfigOutcome {
                control: core.control.clone(),
                flow_rate: core.state.flow_rate,
            }
        };
        info!(
            target_level = outcome.control.target_level,
            flow_rate = outcome.flow_rate,
            "Control settings updated"
        );
        Ok(outcome)
    }

    /// Enable or disable automatic control.
    pub async fn set_auto_mode(&self, on: bool) -> Result<CommandOutcome, SupervisorError> {
        self.command("set_auto_mode", move |core| {
            core.control.auto_mode = on;
            if on {
                "Automatic control enabled".to_owned()
            } else {
                "Manual control enabled".to_owned()
            }
        })
        .await
    }

    /// Raise or clear a simulated leak.
    pub async fn simulate_leak(&self, active: bool) -> Result<CommandOutcome, SupervisorError> {
        let outcome = self
            .command("simulate_leak", move |core| {
                core.state.leak_detected = active;
                if active {
                    "Leak simulation activated".to_owned()
                } else {
                    "Leak simulation deactivated".to_owned()
                }
            })
            .await?;
        warn!(active, "Leak simulation toggled");
        Ok(outcome)
    }

    /// Restore the state derived from the tank description.
    ///
    /// Control settings, history, and the decision log are kept.
    pub async fn reset(&self) -> Result<CommandOutcome, SupervisorError> {
        let tank = &self.tank;
        self.command("reset", move |core| {
            core.state = TankState::initial(tank, Utc::now());
            "Tank reset successfully".to_owned()
        })
        .await
    }

    /// Append a system entry to the decision log and publish it.
    pub async fn record_system_log(&self, message: &str) -> Result<(), SupervisorError> {
        let entry = DecisionLogEntry {
            timestamp: Utc::now(),
            message: message.to_owned(),
            kind: DecisionLogKind::System,
        };
        let mut core = self.lock("record_system_log").await?;
        core.push_log(entry.clone());
        self.sink.publish(TwinEvent::AiLog(entry));
        drop(core);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Alerts
    // -----------------------------------------------------------------------

    /// Mark one alert resolved and publish the refreshed alert list.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`] if no alert has this id.
    pub async fn acknowledge_alert(&self, id: AlertId) -> Result<(), SupervisorError> {
        if !self.alert_store.resolve(id).await? {
            return Err(SupervisorError::NotFound { id });
        }
        info!(alert_id = %id, "Alert acknowledged");
        self.publish_alert_list().await;
        Ok(())
    }

    /// Mark every alert resolved. Returns how many changed.
    pub async fn clear_alerts(&self) -> Result<u64, SupervisorError> {
        let cleared = self.alert_store.resolve_all().await?;
        info!(cleared, "Alerts cleared");
        self.publish_alert_list().await;
        Ok(cleared)
    }

    /// List stored alerts, newest first.
    pub async fn get_alerts(
        &self,
        query: &AlertQuery,
    ) -> Result<Vec<AlertRecord>, SupervisorError> {
        Ok(self.alert_store.list(query).await?)
    }

    async fn publish_alert_list(&self) {
        let query = AlertQuery {
            unresolved_only: false,
            ..AlertQuery::default()
        };
        match self.alert_store.list(&query).await {
            Ok(list) => self.sink.publish(TwinEvent::AlertsUpdate(list)),
            Err(err) => warn!(error = %err, "Failed to load alerts for broadcast"),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Copy of the current state.
    pub async fn get_state(&self) -> Result<TankState, SupervisorError> {
        Ok(self.lock("get_state").await?.state.clone())
    }

    /// Up to `limit` most recent snapshots, newest last.
    pub async fn get_history(&self, limit: usize) -> Result<Vec<TankState>, SupervisorError> {
        Ok(self.lock("get_history").await?.history.recent(limit))
    }

    /// Copy of the control settings.
    pub async fn get_control(&self) -> Result<ControlConfig, SupervisorError> {
        Ok(self.lock("get_control").await?.control.clone())
    }

    /// What the controller would do now, without applying it.
    pub async fn get_ai_decision(&self) -> Result<Decision, SupervisorError> {
        let core = self.lock("get_ai_decision").await?;
        Ok(decision::analyze(&core.state, &core.history, &core.control))
    }

    /// Extrapolate the level; `steps` defaults to the prediction horizon.
    pub async fn predict_trend(
        &self,
        steps: Option<usize>,
    ) -> Result<TrendPrediction, SupervisorError> {
        let core = self.lock("predict_trend").await?;
        let steps = steps.unwrap_or(core.control.prediction_horizon);
        Ok(decision::predict_trend(
            &core.history,
            steps,
            core.control.target_level,
        ))
    }

    /// Anomalies in the current state and recent history.
    pub async fn detect_anomalies(&self) -> Result<Vec<Anomaly>, SupervisorError> {
        let core = self.lock("detect_anomalies").await?;
        Ok(decision::detect_anomalies(&core.state, &core.history))
    }

    /// Up to `limit` most recent decision log entries, newest last.
    pub async fn get_ai_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<DecisionLogEntry>, SupervisorError> {
        Ok(self.lock("get_ai_logs").await?.log.recent(limit))
    }

    /// Engineering report for the current state.
    pub async fn get_diagnostics(&self) -> Result<DiagnosticsReport, SupervisorError> {
        let state = self.get_state().await?;
        Ok(diagnostics::diagnose(
            &state,
            &self.tank,
            &self.diagnostics,
            Utc::now(),
        ))
    }

    /// Timestamp of the current state.
    pub async fn last_update(&self) -> Result<DateTime<Utc>, SupervisorError> {
        Ok(self.lock("last_update").await?.state.last_update)
    }
}

/// Apply a controller action to the fill/drain flags.
///
/// Fill and drain are never both set afterwards.
const fn apply_action(state: &mut TankState, action: TankAction) {
    match action {
        TankAction::Fill => {
            state.is_filling = true;
            state.is_draining = false;
        }
        TankAction::Drain => {
            state.is_draining = true;
            state.is_filling = false;
        }
        TankAction::Stop => {
            state.is_filling = false;
            state.is_draining = false;
        }
        TankAction::Alert => {}
    }
}

const fn clamp_finite(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, SupervisorError> {
    if value.is_finite() {
        Ok(value.clamp(min, max))
    } else {
        Err(SupervisorError::ValidationOutOfRange { field, value })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tanktwin_types::{AlertKind, AlertSeverity, DecisionDetails};

    use super::*;
    use crate::sink::BroadcastSink;
    use crate::store::{HistoryQuery, MemoryAlertStore, MemoryHistoryStore};

    struct Harness {
        supervisor: Arc<Supervisor>,
        history: Arc<MemoryHistoryStore>,
        alerts: Arc<MemoryAlertStore>,
        sink: Arc<BroadcastSink>,
    }

    fn harness_with(tank: TankConfig, control: ControlConfig) -> Harness {
        let history = Arc::new(MemoryHistoryStore::default());
        let alerts = Arc::new(MemoryAlertStore::new());
        let sink = Arc::new(BroadcastSink::new(1024));
        let settings = SupervisorSettings {
            seed: Some(7),
            ..SupervisorSettings::default()
        };
        let supervisor = Supervisor::new(
            tank,
            control,
            settings,
            Arc::clone(&history) as Arc<dyn HistoryStore>,
            Arc::clone(&alerts) as Arc<dyn AlertStore>,
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        Harness {
            supervisor: Arc::new(supervisor),
            history,
            alerts,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(TankConfig::default(), ControlConfig::default())
    }

    fn manual() -> ControlConfig {
        ControlConfig {
            auto_mode: false,
            ..ControlConfig::default()
        }
    }

    #[tokio::test]
    async fn fill_and_drain_are_mutually_exclusive() {
        let h = harness();
        let s = &h.supervisor;
        let state = s.set_fill(true).await.unwrap().state;
        assert!(state.is_filling && !state.is_draining);
        let state = s.set_drain(true).await.unwrap().state;
        assert!(state.is_draining && !state.is_filling);
        let state = s.set_fill(true).await.unwrap().state;
        assert!(state.is_filling && !state.is_draining);
        let state = s.stop().await.unwrap().state;
        assert!(!state.is_filling && !state.is_draining);
    }

    #[tokio::test]
    async fn flow_rate_and_target_are_clamped() {
        let h = harness();
        let s = &h.supervisor;
        assert!((s.set_flow_rate(100.0).await.unwrap().state.flow_rate - 50.0).abs() < 1e-9);
        assert!((s.set_flow_rate(1.0).await.unwrap().state.flow_rate - 5.0).abs() < 1e-9);
        s.set_target(150.0).await.unwrap();
        assert!((s.get_control().await.unwrap().target_level - 100.0).abs() < 1e-9);
        s.set_target(-3.0).await.unwrap();
        assert!(s.get_control().await.unwrap().target_level.abs() < 1e-9);
    }

    #[tokio::test]
    async fn set_target_reports_the_applied_target() {
        let h = harness();
        let s = &h.supervisor;
        let outcome = s.set_target(150.0).await.unwrap();
        assert!((outcome.control.target_level - 100.0).abs() < 1e-9);

        // A later command must not change what the earlier outcome reports.
        s.set_target(25.0).await.unwrap();
        assert!((outcome.control.target_level - 100.0).abs() < 1e-9);
        assert!(outcome.message.contains("100.0"));
    }

    #[tokio::test]
    async fn non_finite_inputs_are_rejected() {
        let h = harness();
        let err = h.supervisor.set_flow_rate(f64::NAN).await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::ValidationOutOfRange {
                field: "flow_rate",
                ..
            }
        ));
        let update = ConfigUpdate {
            target_level: Some(50.0),
            flow_rate: Some(f64::INFINITY),
        };
        assert!(h.supervisor.update_config(update).await.is_err());
        // Nothing applied when either input is bad.
        let control = h.supervisor.get_control().await.unwrap();
        assert!((control.target_level - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn update_config_applies_both() {
        let h = harness();
        let outcome = h
            .supervisor
            .update_config(ConfigUpdate {
                target_level: Some(55.0),
                flow_rate: Some(30.0),
            })
            .await
            .unwrap();
        assert!((outcome.control.target_level - 55.0).abs() < 1e-9);
        assert!((outcome.flow_rate - 30.0).abs() < 1e-9);
        let state = h.supervisor.get_state().await.unwrap();
        assert!((state.flow_rate - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn auto_fill_reaches_target_and_stops() {
        let h = harness();
        let s = &h.supervisor;
        let mut stopped_in_band = false;
        for _ in 0..2000 {
            let report = s.tick().await.unwrap();
            let level = report.state.water_level;
            assert!(level <= 100.0);
            assert!(!(report.state.is_filling && report.state.is_draining));
            let action = report.decision.unwrap().action;
            if level < 79.0 {
                assert_eq!(action, TankAction::Fill, "level {level}");
            } else if level <= 81.0 {
                assert_eq!(action, TankAction::Stop, "level {level}");
                stopped_in_band = true;
                break;
            }
        }
        assert!(stopped_in_band);
        let state = s.get_state().await.unwrap();
        assert!(!state.is_filling);

        let logs = s.get_ai_logs(10).await.unwrap();
        assert!(logs.iter().any(|l| l.message.starts_with("Reached target level")));
    }

    #[tokio::test]
    async fn leak_stops_everything_and_raises_critical_alert() {
        let h = harness();
        let s = &h.supervisor;
        s.set_fill(true).await.unwrap();
        s.simulate_leak(true).await.unwrap();

        let report = s.tick().await.unwrap();
        assert!(!report.state.is_filling);
        assert!(!report.state.is_draining);
        assert_eq!(report.decision.unwrap().details, DecisionDetails::Emergency);

        let stored = s.get_alerts(&AlertQuery::default()).await.unwrap();
        assert!(stored.iter().any(|a| {
            a.kind == AlertKind::LeakDetected && a.severity == AlertSeverity::Critical
        }));
    }

    #[tokio::test]
    async fn clear_alerts_leaves_nothing_unresolved() {
        let h = harness();
        let s = &h.supervisor;
        s.simulate_leak(true).await.unwrap();
        s.tick().await.unwrap();
        s.tick().await.unwrap();
        assert!(s.clear_alerts().await.unwrap() >= 2);
        assert!(s.get_alerts(&AlertQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn acknowledge_unknown_alert_is_not_found() {
        let h = harness();
        let err = h.supervisor.acknowledge_alert(AlertId::new()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn acknowledge_publishes_alert_list() {
        let h = harness();
        let s = &h.supervisor;
        s.simulate_leak(true).await.unwrap();
        let report = s.tick().await.unwrap();
        let id = report.alerts.first().unwrap().id;

        let mut rx = h.sink.subscribe();
        s.acknowledge_alert(id).await.unwrap();
        match rx.recv().await.unwrap() {
            TwinEvent::AlertsUpdate(list) => {
                assert!(list.iter().any(|a| a.id == id && a.resolved));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn manual_mode_does_not_act() {
        let h = harness_with(TankConfig::default(), manual());
        let report = h.supervisor.tick().await.unwrap();
        assert!(report.decision.is_none());
        assert!(!report.state.is_filling);
        // Advisory decision is still available.
        let decision = h.supervisor.get_ai_decision().await.unwrap();
        assert_eq!(decision.action, TankAction::Fill);
        assert!(!h.supervisor.get_state().await.unwrap().is_filling);
    }

    #[tokio::test]
    async fn reset_restores_state_and_keeps_settings() {
        let h = harness_with(TankConfig::default(), manual());
        let s = &h.supervisor;
        s.set_flow_rate(45.0).await.unwrap();
        s.set_target(40.0).await.unwrap();
        s.set_drain(true).await.unwrap();
        s.simulate_leak(true).await.unwrap();
        for _ in 0..5 {
            s.tick().await.unwrap();
        }

        let state = s.reset().await.unwrap().state;
        assert!((state.water_level - 60.0).abs() < 1e-9);
        assert!((state.flow_rate - 20.0).abs() < 1e-9);
        assert!(!state.is_draining && !state.leak_detected);
        assert!((s.get_control().await.unwrap().target_level - 40.0).abs() < 1e-9);
        assert_eq!(s.get_history(100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn tick_publishes_update_alerts_and_logs() {
        let h = harness();
        let mut rx = h.sink.subscribe();
        h.supervisor.simulate_leak(true).await.unwrap();
        h.supervisor.tick().await.unwrap();

        let mut topics = Vec::new();
        while let Ok(event) = rx.try_recv() {
            topics.push(event.topic());
        }
        assert_eq!(topics, vec!["tank_update", "tank_update", "alert", "ai_log"]);
    }

    #[tokio::test(start_paused = true)]
    async fn command_during_slow_persist_is_the_last_broadcast() {
        let h = harness_with(TankConfig::default(), manual());
        h.history.set_append_delay(Duration::from_millis(100));
        let mut rx = h.sink.subscribe();

        let s = Arc::clone(&h.supervisor);
        let ticking = tokio::spawn(async move { s.tick().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.supervisor.set_fill(true).await.unwrap();
        ticking.await.unwrap().unwrap();

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let TwinEvent::TankUpdate(state) = event {
                last = Some(state.is_filling);
            }
        }
        assert_eq!(last, Some(true));
        assert!(h.supervisor.get_state().await.unwrap().is_filling);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_persistence_is_abandoned_at_the_deadline() {
        let h = harness_with(TankConfig::default(), manual());
        h.history.set_append_delay(Duration::from_secs(5));
        let deadline = h.supervisor.settings().persist_timeout;

        let before = tokio::time::Instant::now();
        let report = h.supervisor.tick().await.unwrap();
        let elapsed = before.elapsed();

        assert!(elapsed >= deadline && elapsed < Duration::from_secs(5));
        assert_eq!(report.persistence_failures, 1);
        assert_eq!(h.supervisor.persistence_failures(), 1);
        assert_eq!(h.history.len().await, 0);
    }

    #[tokio::test]
    async fn failing_stores_do_not_fail_the_tick() {
        let h = harness();
        h.history.set_failing(true);
        h.alerts.set_failing(true);
        h.supervisor.simulate_leak(true).await.unwrap();

        let report = h.supervisor.tick().await.unwrap();
        assert_eq!(report.persistence_failures, 2);
        assert_eq!(h.supervisor.persistence_failures(), 2);

        h.history.set_failing(false);
        h.supervisor.tick().await.unwrap();
        let stored = h.history.query(&HistoryQuery::latest(10)).await.unwrap();
        assert_eq!(stored.len(), 1);

        let err = h.supervisor.clear_alerts().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Persistence { .. }));
    }

    #[tokio::test]
    async fn history_is_bounded_and_newest_last() {
        let h = harness_with(TankConfig::default(), manual());
        for _ in 0..1005 {
            h.supervisor.tick().await.unwrap();
        }
        let history = h.supervisor.get_history(5000).await.unwrap();
        assert_eq!(history.len(), 1000);
        let latest = h.supervisor.get_state().await.unwrap();
        assert_eq!(history.last().unwrap().last_update, latest.last_update);
    }

    #[tokio::test]
    async fn trend_uses_prediction_horizon_by_default() {
        let h = harness();
        assert_eq!(
            h.supervisor.predict_trend(None).await.unwrap(),
            TrendPrediction::InsufficientData
        );
        for _ in 0..6 {
            h.supervisor.tick().await.unwrap();
        }
        match h.supervisor.predict_trend(None).await.unwrap() {
            TrendPrediction::Forecast(forecast) => {
                assert_eq!(forecast.predicted_levels.len(), 10);
            }
            TrendPrediction::InsufficientData => panic!("expected a forecast"),
        }
    }

    #[tokio::test]
    async fn system_log_entries_are_recorded() {
        let h = harness();
        h.supervisor.record_system_log("Simulation started").await.unwrap();
        let logs = h.supervisor.get_ai_logs(5).await.unwrap();
        let entry = logs.last().unwrap();
        assert_eq!(entry.kind, DecisionLogKind::System);
        assert_eq!(entry.message, "Simulation started");
    }

    #[tokio::test]
    async fn diagnostics_reflect_current_state() {
        let h = harness();
        let report = h.supervisor.get_diagnostics().await.unwrap();
        let height = report.fluid_dynamics.water_height;
        assert!(height > 0.0 && height < h.supervisor.tank().height);
    }

    #[tokio::test]
    async fn lock_timeout_is_reported() {
        let settings = SupervisorSettings {
            lock_timeout: Duration::from_millis(20),
            seed: Some(1),
            ..SupervisorSettings::default()
        };
        let supervisor = Supervisor::new(
            TankConfig::default(),
            ControlConfig::default(),
            settings,
            Arc::new(MemoryHistoryStore::default()),
            Arc::new(MemoryAlertStore::new()),
            Arc::new(crate::sink::NullSink),
        );
        let _held = supervisor.core.lock().await;
        let err = supervisor.get_state().await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::ConcurrencyTimeout {
                operation: "get_state",
                waited_ms: 20,
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commands_never_set_fill_and_drain_together() {
        let h = harness();
        let mut tasks = Vec::new();
        for i in 0..8_u32 {
            let s = Arc::clone(&h.supervisor);
            tasks.push(tokio::spawn(async move {
                for j in 0..50_u32 {
                    let state = match (i.wrapping_add(j)) % 4 {
                        0 => s.set_fill(true).await.map(|o| o.state),
                        1 => s.set_drain(true).await.map(|o| o.state),
                        2 => s.stop().await.map(|o| o.state),
                        _ => s.tick().await.map(|r| r.state),
                    }
                    .unwrap();
                    assert!(!(state.is_filling && state.is_draining));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        let state = h.supervisor.get_state().await.unwrap();
        assert!(!(state.is_filling && state.is_draining));
    }
}
