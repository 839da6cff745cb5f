//! Simulation lifecycle endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/simulation/start` | Start the tick loop |
//! | `POST` | `/api/simulation/stop` | Stop the tick loop |
//! | `GET` | `/api/simulation/status` | Loop state and counters |
//!
//! Starting an already running loop (or stopping a stopped one) is not an
//! error; the response carries `success: false` with status 200.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use tanktwin_core::runner::LifecycleOutcome;

use crate::state::AppState;

/// `POST /api/simulation/start`
pub async fn start(State(state): State<Arc<AppState>>) -> Json<LifecycleOutcome> {
    Json(state.simulation.start().await)
}

/// `POST /api/simulation/stop`
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<LifecycleOutcome> {
    Json(state.simulation.stop().await)
}

/// `GET /api/simulation/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let status = state.simulation.status().await;
    Json(serde_json::json!({
        "success": true,
        "data": status,
    }))
}
