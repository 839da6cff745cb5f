//! Axum router construction for the twin API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{alerts, control, handlers, simulation, ws};

/// Build the complete Axum router.
///
/// See the module docs of [`handlers`], [`control`], [`alerts`] and
/// [`simulation`] for the endpoint tables. CORS allows any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_events))
        // Tank
        .route("/api/tank/state", get(handlers::get_state))
        .route("/api/tank/history", get(handlers::get_history))
        .route("/api/tank/diagnostics", get(handlers::get_diagnostics))
        // Control
        .route("/api/control/fill", post(control::fill))
        .route("/api/control/drain", post(control::drain))
        .route("/api/control/stop", post(control::stop))
        .route("/api/control/flow_rate", post(control::set_flow_rate))
        .route("/api/control/target", post(control::set_target))
        .route("/api/control/mode", post(control::set_mode))
        .route(
            "/api/control/config",
            get(control::get_config).post(control::update_config),
        )
        .route("/api/control/simulate/leak", post(control::simulate_leak))
        .route("/api/control/reset", post(control::reset))
        .route("/api/control/ai/decision", get(control::ai_decision))
        .route("/api/control/ai/logs", get(control::ai_logs))
        .route("/api/control/ai/prediction", get(control::ai_prediction))
        .route("/api/control/ai/anomalies", get(control::ai_anomalies))
        // Alerts
        .route("/api/alerts", get(alerts::list_alerts))
        .route("/api/alerts/clear", post(alerts::clear_alerts))
        .route("/api/alerts/{id}/acknowledge", post(alerts::acknowledge_alert))
        // Simulation lifecycle
        .route("/api/simulation/start", post(simulation::start))
        .route("/api/simulation/stop", post(simulation::stop))
        .route("/api/simulation/status", get(simulation::status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
