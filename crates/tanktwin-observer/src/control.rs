//! Control command and controller advisory endpoints.
//!
//! Bodies are optional JSON; a missing body or missing field falls back to
//! the documented default.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/control/fill` | Start (or with `{"active": false}` stop) filling |
//! | `POST` | `/api/control/drain` | Start (or stop) draining |
//! | `POST` | `/api/control/stop` | Stop all operations |
//! | `POST` | `/api/control/flow_rate` | Set pump flow rate `{rate}` |
//! | `POST` | `/api/control/target` | Set target level `{target}` |
//! | `POST` | `/api/control/mode` | Switch auto/manual `{ai_mode}` |
//! | `GET` | `/api/control/config` | Current control settings |
//! | `POST` | `/api/control/config` | Update `{target_level?, flow_rate?}` |
//! | `POST` | `/api/control/simulate/leak` | Raise or clear a leak `{active}` |
//! | `POST` | `/api/control/reset` | Reset the tank |
//! | `GET` | `/api/control/ai/decision` | What the controller would do now |
//! | `GET` | `/api/control/ai/logs` | Decision log (`?limit=`, default 20) |
//! | `GET` | `/api/control/ai/prediction` | Level forecast (`?steps=`) |
//! | `GET` | `/api/control/ai/anomalies` | Detected anomalies |

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde_json::Value;
use tanktwin_core::decision::MAX_PREDICTION_STEPS;
use tanktwin_core::supervisor::ConfigUpdate;
use tanktwin_types::DEFAULT_FLOW_RATE_LPM;

use crate::error::ObserverError;
use crate::handlers::{LimitQuery, MAX_LIMIT, command_response, parse_body};
use crate::state::AppState;

/// Default number of decision log entries returned.
const DEFAULT_LOG_LIMIT: usize = 20;

/// Target applied when a `target` request carries no value.
const DEFAULT_TARGET_LEVEL: f64 = 80.0;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for endpoints that switch something on or off.
#[derive(Debug, serde::Deserialize)]
pub struct ToggleRequest {
    /// Desired state; defaults to on.
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Default for ToggleRequest {
    fn default() -> Self {
        Self {
            active: default_active(),
        }
    }
}

const fn default_active() -> bool {
    true
}

/// Body for `POST /api/control/flow_rate`.
#[derive(Debug, serde::Deserialize)]
pub struct FlowRateRequest {
    /// Flow rate in L/min; clamped to the pump limits.
    #[serde(default = "default_rate")]
    pub rate: f64,
}

impl Default for FlowRateRequest {
    fn default() -> Self {
        Self {
            rate: default_rate(),
        }
    }
}

const fn default_rate() -> f64 {
    DEFAULT_FLOW_RATE_LPM
}

/// Body for `POST /api/control/target`.
#[derive(Debug, serde::Deserialize)]
pub struct TargetRequest {
    /// Target level in percent; clamped to `0..=100`.
    #[serde(default = "default_target")]
    pub target: f64,
}

impl Default for TargetRequest {
    fn default() -> Self {
        Self {
            target: default_target(),
        }
    }
}

const fn default_target() -> f64 {
    DEFAULT_TARGET_LEVEL
}

/// Body for `POST /api/control/mode`.
#[derive(Debug, serde::Deserialize)]
pub struct ModeRequest {
    /// `true` for automatic control.
    #[serde(default = "default_active")]
    pub ai_mode: bool,
}

impl Default for ModeRequest {
    fn default() -> Self {
        Self {
            ai_mode: default_active(),
        }
    }
}

/// Body for `POST /api/control/config`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ConfigRequest {
    /// New target level.
    pub target_level: Option<f64>,
    /// New flow rate.
    pub flow_rate: Option<f64>,
}

/// Query parameters for `GET /api/control/ai/prediction`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct PredictionQuery {
    /// Steps to extrapolate; defaults to the configured horizon.
    pub steps: Option<usize>,
}

// ---------------------------------------------------------------------------
// Fill / drain / stop
// ---------------------------------------------------------------------------

/// Start or stop filling.
pub async fn fill(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: ToggleRequest = parse_body(&body)?;
    let outcome = state.supervisor.set_fill(request.active).await?;
    let is_filling = outcome.state.is_filling;
    command_response(&outcome, serde_json::json!({ "is_filling": is_filling }))
}

/// Start or stop draining.
pub async fn drain(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: ToggleRequest = parse_body(&body)?;
    let outcome = state.supervisor.set_drain(request.active).await?;
    let is_draining = outcome.state.is_draining;
    command_response(&outcome, serde_json::json!({ "is_draining": is_draining }))
}

/// Stop filling and draining.
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ObserverError> {
    let outcome = state.supervisor.stop().await?;
    command_response(
        &outcome,
        serde_json::json!({ "is_filling": false, "is_draining": false }),
    )
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Set the pump flow rate.
pub async fn set_flow_rate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: FlowRateRequest = parse_body(&body)?;
    let outcome = state.supervisor.set_flow_rate(request.rate).await?;
    let flow_rate = outcome.state.flow_rate;
    command_response(&outcome, serde_json::json!({ "flow_rate": flow_rate }))
}

/// Set the target level.
pub async fn set_target(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: TargetRequest = parse_body(&body)?;
    let outcome = state.supervisor.set_target(request.target).await?;
    let target_level = outcome.control.target_level;
    command_response(&outcome, serde_json::json!({ "target_level": target_level }))
}

/// Switch between automatic and manual control.
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: ModeRequest = parse_body(&body)?;
    let outcome = state.supervisor.set_auto_mode(request.ai_mode).await?;
    command_response(&outcome, serde_json::json!({ "ai_mode": request.ai_mode }))
}

/// Return the control settings and current flow rate.
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let control = state.supervisor.get_control().await?;
    let tank = state.supervisor.get_state().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "config": control,
        "flow_rate": tank.flow_rate,
    })))
}

/// Apply a target and/or flow rate change atomically.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: ConfigRequest = parse_body(&body)?;
    let outcome = state
        .supervisor
        .update_config(ConfigUpdate {
            target_level: request.target_level,
            flow_rate: request.flow_rate,
        })
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "config": {
            "target_level": outcome.control.target_level,
            "flow_rate": outcome.flow_rate,
        },
    })))
}

// ---------------------------------------------------------------------------
// Leak / reset
// ---------------------------------------------------------------------------

/// Raise or clear a simulated leak.
pub async fn simulate_leak(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ObserverError> {
    let request: ToggleRequest = parse_body(&body)?;
    let outcome = state.supervisor.simulate_leak(request.active).await?;
    let leak = outcome.state.leak_detected;
    command_response(&outcome, serde_json::json!({ "leak_detected": leak }))
}

/// Restore the tank to its initial state.
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ObserverError> {
    let outcome = state.supervisor.reset().await?;
    command_response(&outcome, Value::Null)
}

// ---------------------------------------------------------------------------
// Controller advisories
// ---------------------------------------------------------------------------

/// What the controller would do now, without applying it.
pub async fn ai_decision(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let decision = state.supervisor.get_ai_decision().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": decision,
    })))
}

/// Recent decision log entries, oldest first.
pub async fn ai_logs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Value>, ObserverError> {
    let Query(params) = query?;
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LIMIT);
    let logs = state.supervisor.get_ai_logs(limit).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": logs.len(),
        "data": logs,
    })))
}

/// Linear forecast of the level.
pub async fn ai_prediction(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PredictionQuery>, QueryRejection>,
) -> Result<Json<Value>, ObserverError> {
    let Query(params) = query?;
    if params.steps.is_some_and(|s| s > MAX_PREDICTION_STEPS) {
        return Err(ObserverError::InvalidQuery(format!(
            "steps must be at most {MAX_PREDICTION_STEPS}"
        )));
    }
    let prediction = state.supervisor.predict_trend(params.steps).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": prediction,
    })))
}

/// Anomalies in the current state and recent history.
pub async fn ai_anomalies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let anomalies = state.supervisor.detect_anomalies().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": anomalies.len(),
        "data": anomalies,
    })))
}
