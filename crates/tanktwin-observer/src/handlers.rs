//! Service index, tank read endpoints, and shared handler helpers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Service index |
//! | `GET` | `/api/tank/state` | Current tank state |
//! | `GET` | `/api/tank/history` | Recent snapshots (`?limit=`, default 100) |
//! | `GET` | `/api/tank/diagnostics` | Engineering report |

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tanktwin_core::supervisor::CommandOutcome;

use crate::error::ObserverError;
use crate::state::AppState;

/// Default number of snapshots returned by the history endpoint.
const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Largest `limit` accepted by list endpoints.
pub(crate) const MAX_LIMIT: usize = 10_000;

/// Routes listed by the service index.
const ENDPOINTS: &[&str] = &[
    "GET /api/tank/state",
    "GET /api/tank/history?limit=",
    "GET /api/tank/diagnostics",
    "POST /api/control/fill",
    "POST /api/control/drain",
    "POST /api/control/stop",
    "POST /api/control/flow_rate",
    "POST /api/control/target",
    "POST /api/control/mode",
    "GET /api/control/config",
    "POST /api/control/config",
    "POST /api/control/simulate/leak",
    "POST /api/control/reset",
    "GET /api/control/ai/decision",
    "GET /api/control/ai/logs?limit=",
    "GET /api/control/ai/prediction?steps=",
    "GET /api/control/ai/anomalies",
    "GET /api/alerts?unresolved_only=&limit=&severity=",
    "POST /api/alerts/{id}/acknowledge",
    "POST /api/alerts/clear",
    "POST /api/simulation/start",
    "POST /api/simulation/stop",
    "GET /api/simulation/status",
    "GET /ws",
];

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters carrying an optional `limit`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct LimitQuery {
    /// Maximum number of items to return.
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET / -- service index
// ---------------------------------------------------------------------------

/// Describe the service and list its endpoints.
pub async fn index(State(state): State<Arc<AppState>>) -> Json<Value> {
    let running = state.simulation.is_running().await;
    Json(serde_json::json!({
        "success": true,
        "name": "Water Tank Digital Twin",
        "version": env!("CARGO_PKG_VERSION"),
        "simulation_running": running,
        "endpoints": ENDPOINTS,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/tank/*
// ---------------------------------------------------------------------------

/// Return the current tank state.
pub async fn get_state(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ObserverError> {
    let tank = state.supervisor.get_state().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": tank,
    })))
}

/// Return up to `limit` recent snapshots, oldest first.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Value>, ObserverError> {
    let Query(params) = query?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_LIMIT);
    let history = state.supervisor.get_history(limit).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": history.len(),
        "data": history,
    })))
}

/// Return the engineering diagnostics report.
pub async fn get_diagnostics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let report = state.supervisor.get_diagnostics().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": report,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an optional JSON body; an empty body yields `T::default()`.
pub(crate) fn parse_body<T>(bytes: &Bytes) -> Result<T, ObserverError>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ObserverError::InvalidBody(e.to_string()))
}

/// Serialize a command outcome and merge `extra` fields into it.
pub(crate) fn command_response(
    outcome: &CommandOutcome,
    extra: Value,
) -> Result<Json<Value>, ObserverError> {
    let mut body = serde_json::to_value(outcome)?;
    if let (Some(map), Value::Object(extra)) = (body.as_object_mut(), extra) {
        map.extend(extra);
    }
    Ok(Json(body))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Default, serde::Deserialize)]
    struct Toggle {
        #[serde(default)]
        active: Option<bool>,
    }

    #[test]
    fn empty_body_uses_default() {
        let parsed: Toggle = parse_body(&Bytes::new()).unwrap();
        assert!(parsed.active.is_none());
        let parsed: Toggle = parse_body(&Bytes::from_static(b"  \n")).unwrap();
        assert!(parsed.active.is_none());
    }

    #[test]
    fn json_body_is_parsed() {
        let parsed: Toggle = parse_body(&Bytes::from_static(br#"{"active": false}"#)).unwrap();
        assert_eq!(parsed.active, Some(false));
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = parse_body::<Toggle>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert!(matches!(err, ObserverError::InvalidBody(_)));
    }
}
