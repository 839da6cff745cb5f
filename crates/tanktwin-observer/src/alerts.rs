//! Alert listing and acknowledgement.
//!
//! Alerts are raised by the tick and stored in the configured
//! [`AlertStore`](tanktwin_core::store::AlertStore). These handlers only
//! read and resolve them.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/alerts` | List alerts (`?unresolved_only=&limit=&severity=`) |
//! | `POST` | `/api/alerts/{id}/acknowledge` | Resolve one alert |
//! | `POST` | `/api/alerts/clear` | Resolve every alert |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use serde_json::Value;
use tanktwin_core::store::AlertQuery;
use tanktwin_types::{AlertId, AlertSeverity};

use crate::error::ObserverError;
use crate::handlers::MAX_LIMIT;
use crate::state::AppState;

/// Query parameters for `GET /api/alerts`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct AlertsQuery {
    /// Skip resolved alerts (default `true`).
    pub unresolved_only: Option<bool>,
    /// Maximum number of alerts to return (default 100).
    pub limit: Option<usize>,
    /// Only alerts of this severity (`medium`, `high`, `critical`).
    pub severity: Option<String>,
}

impl AlertsQuery {
    /// Resolve defaults and parse the severity filter.
    fn into_store_query(self) -> Result<AlertQuery, ObserverError> {
        let defaults = AlertQuery::default();
        let severity = match self.severity.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(AlertSeverity::parse(raw).ok_or_else(|| {
                ObserverError::InvalidQuery(format!("unknown severity: {raw}"))
            })?),
        };
        Ok(AlertQuery {
            unresolved_only: self.unresolved_only.unwrap_or(defaults.unresolved_only),
            limit: self.limit.unwrap_or(defaults.limit).min(MAX_LIMIT),
            severity,
        })
    }
}

/// `GET /api/alerts` -- list alerts, newest first.
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AlertsQuery>, QueryRejection>,
) -> Result<Json<Value>, ObserverError> {
    let Query(params) = query?;
    let alerts = state
        .supervisor
        .get_alerts(&params.into_store_query()?)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "count": alerts.len(),
        "data": alerts,
    })))
}

/// `POST /api/alerts/{id}/acknowledge` -- resolve an alert.
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Json<Value>, ObserverError> {
    let id = id_str
        .parse::<AlertId>()
        .map_err(|e| ObserverError::InvalidUuid(format!("{id_str}: {e}")))?;

    state.supervisor.acknowledge_alert(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Alert {id} acknowledged"),
    })))
}

/// `POST /api/alerts/clear` -- resolve every alert.
pub async fn clear_alerts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let cleared = state.supervisor.clear_alerts().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "All alerts cleared",
        "cleared": cleared,
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
