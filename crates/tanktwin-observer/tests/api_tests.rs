//! Integration tests for the twin API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The supervisor runs on in-memory stores.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tanktwin_core::runner::SimulationController;
use tanktwin_core::sink::{BroadcastSink, EventSink};
use tanktwin_core::store::{MemoryAlertStore, MemoryHistoryStore};
use tanktwin_core::supervisor::{Supervisor, SupervisorSettings};
use tanktwin_observer::router::build_router;
use tanktwin_observer::state::AppState;
use tanktwin_types::{ControlConfig, TankConfig, TwinEvent};
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let sink = Arc::new(BroadcastSink::new(256));
    let settings = SupervisorSettings {
        seed: Some(11),
        ..SupervisorSettings::default()
    };
    let supervisor = Arc::new(Supervisor::new(
        TankConfig::default(),
        ControlConfig::default(),
        settings,
        Arc::new(MemoryHistoryStore::default()),
        Arc::new(MemoryAlertStore::new()),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    ));
    let simulation = Arc::new(SimulationController::new(
        Arc::clone(&supervisor),
        Duration::from_millis(50),
    ));
    Arc::new(AppState::new(supervisor, simulation, sink.sender()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post(router: &Router, path: &str, body: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// Index and tank reads
// =========================================================================

#[tokio::test]
async fn test_index_lists_endpoints() {
    let router = build_router(make_test_state());
    let (status, json) = get(&router, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Water Tank Digital Twin");
    assert_eq!(json["simulation_running"], false);
    assert!(json["endpoints"].as_array().unwrap().len() > 20);
}

#[tokio::test]
async fn test_get_state() {
    let router = build_router(make_test_state());
    let (status, json) = get(&router, "/api/tank/state").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["water_level"], 60.0);
    assert_eq!(json["data"]["is_filling"], false);
}

#[tokio::test]
async fn test_history_respects_limit() {
    let state = make_test_state();
    for _ in 0..3 {
        state.supervisor.tick().await.unwrap();
    }
    let router = build_router(state);

    let (status, json) = get(&router, "/api/tank/history?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);

    let (_, json) = get(&router, "/api/tank/history").await;
    assert_eq!(json["count"], 3);
}

#[tokio::test]
async fn test_history_bad_limit_is_bad_request() {
    let router = build_router(make_test_state());
    let (status, json) = get(&router, "/api/tank/history?limit=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_diagnostics() {
    let router = build_router(make_test_state());
    let (status, json) = get(&router, "/api/tank/diagnostics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].is_object());
}

// =========================================================================
// Control commands
// =========================================================================

#[tokio::test]
async fn test_fill_with_empty_body_starts_filling() {
    let router = build_router(make_test_state());
    let (status, json) = post(&router, "/api/control/fill", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["is_filling"], true);
    assert_eq!(json["state"]["is_draining"], false);
}

#[tokio::test]
async fn test_drain_stops_filling() {
    let router = build_router(make_test_state());
    post(&router, "/api/control/fill", "").await;
    let (status, json) = post(&router, "/api/control/drain", r#"{"active": true}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_draining"], true);
    assert_eq!(json["state"]["is_filling"], false);

    let (_, json) = post(&router, "/api/control/stop", "").await;
    assert_eq!(json["state"]["is_filling"], false);
    assert_eq!(json["state"]["is_draining"], false);
}

#[tokio::test]
async fn test_flow_rate_is_clamped() {
    let router = build_router(make_test_state());

    let (_, json) = post(&router, "/api/control/flow_rate", r#"{"rate": 100}"#).await;
    assert_eq!(json["flow_rate"], 50.0);

    let (_, json) = post(&router, "/api/control/flow_rate", r#"{"rate": 1}"#).await;
    assert_eq!(json["flow_rate"], 5.0);
}

#[tokio::test]
async fn test_target_is_clamped() {
    let router = build_router(make_test_state());
    let (status, json) = post(&router, "/api/control/target", r#"{"target": 140}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["target_level"], 100.0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let router = build_router(make_test_state());
    let (status, json) = post(&router, "/api/control/flow_rate", "{rate:").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_config_update_and_read() {
    let router = build_router(make_test_state());
    let (status, json) = post(
        &router,
        "/api/control/config",
        r#"{"target_level": 90, "flow_rate": 30}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["target_level"], 90.0);
    assert_eq!(json["config"]["flow_rate"], 30.0);

    let (_, json) = get(&router, "/api/control/config").await;
    assert_eq!(json["config"]["target_level"], 90.0);
    assert_eq!(json["config"]["auto_mode"], true);
    assert_eq!(json["flow_rate"], 30.0);
}

#[tokio::test]
async fn test_manual_mode() {
    let router = build_router(make_test_state());
    let (_, json) = post(&router, "/api/control/mode", r#"{"ai_mode": false}"#).await;
    assert_eq!(json["ai_mode"], false);

    let (_, json) = get(&router, "/api/control/config").await;
    assert_eq!(json["config"]["auto_mode"], false);
}

#[tokio::test]
async fn test_reset_restores_initial_level() {
    let state = make_test_state();
    state.supervisor.set_fill(true).await.unwrap();
    for _ in 0..5 {
        state.supervisor.tick().await.unwrap();
    }
    let router = build_router(state);

    let (status, json) = post(&router, "/api/control/reset", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["state"]["water_level"], 60.0);
}

// =========================================================================
// Controller advisories
// =========================================================================

#[tokio::test]
async fn test_ai_decision_below_target_is_fill() {
    let router = build_router(make_test_state());
    let (status, json) = get(&router, "/api/control/ai/decision").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["action"], "fill");
}

#[tokio::test]
async fn test_prediction_needs_history() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state));

    let (_, json) = get(&router, "/api/control/ai/prediction").await;
    assert_eq!(json["data"]["prediction"], "insufficient_data");

    state.supervisor.set_fill(true).await.unwrap();
    for _ in 0..6 {
        state.supervisor.tick().await.unwrap();
    }
    let (_, json) = get(&router, "/api/control/ai/prediction?steps=4").await;
    assert_eq!(json["data"]["prediction"], "forecast");
    assert_eq!(json["data"]["predicted_levels"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_prediction_rejects_huge_horizon() {
    let router = build_router(make_test_state());
    let (status, _) = get(&router, "/api/control/ai/prediction?steps=1000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ai_logs_and_anomalies() {
    let state = make_test_state();
    state.supervisor.record_system_log("Operator note").await.unwrap();
    let router = build_router(state);

    let (_, json) = get(&router, "/api/control/ai/logs?limit=5").await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["message"], "Operator note");

    let (status, json) = get(&router, "/api/control/ai/anomalies").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].is_array());
}

// =========================================================================
// Alerts
// =========================================================================

#[tokio::test]
async fn test_leak_raises_critical_alert() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state));

    let (_, json) = post(&router, "/api/control/simulate/leak", "").await;
    assert_eq!(json["leak_detected"], true);
    state.supervisor.tick().await.unwrap();

    let (status, json) = get(&router, "/api/alerts").await;
    assert_eq!(status, StatusCode::OK);
    let alerts = json["data"].as_array().unwrap();
    assert!(
        alerts
            .iter()
            .any(|a| a["kind"] == "leak_detected" && a["severity"] == "critical")
    );

    let (_, json) = get(&router, "/api/alerts?severity=critical").await;
    let critical = json["data"].as_array().unwrap();
    assert!(!critical.is_empty());
    assert!(critical.iter().all(|a| a["severity"] == "critical"));

    let (status, _) = get(&router, "/api/alerts?severity=catastrophic").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_acknowledge_and_clear() {
    let state = make_test_state();
    state.supervisor.simulate_leak(true).await.unwrap();
    state.supervisor.tick().await.unwrap();
    let router = build_router(state);

    let (_, json) = get(&router, "/api/alerts").await;
    let id = json["data"][0]["id"].as_str().unwrap().to_owned();

    let (status, json) = post(&router, &format!("/api/alerts/{id}/acknowledge"), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], format!("Alert {id} acknowledged"));

    let (_, json) = get(&router, "/api/alerts?unresolved_only=false").await;
    assert!(
        json["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["id"] == id.as_str() && a["resolved"] == true)
    );

    let (status, json) = post(&router, "/api/alerts/clear", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "All alerts cleared");

    let (_, json) = get(&router, "/api/alerts").await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_acknowledge_unknown_alert_is_not_found() {
    let router = build_router(make_test_state());
    let path = "/api/alerts/0191d1a4-8b7e-7c3a-9f00-000000000000/acknowledge";
    let (status, json) = post(&router, path, "").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_acknowledge_bad_id_is_bad_request() {
    let router = build_router(make_test_state());
    let (status, _) = post(&router, "/api/alerts/not-a-uuid/acknowledge", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =========================================================================
// Simulation lifecycle
// =========================================================================

#[tokio::test]
async fn test_simulation_start_stop_status() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state));

    let (status, json) = post(&router, "/api/simulation/start", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, json) = post(&router, "/api/simulation/start", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);

    let (_, json) = get(&router, "/api/simulation/status").await;
    assert_eq!(json["data"]["running"], true);
    assert_eq!(json["data"]["tick_interval_ms"], 50);

    let (_, json) = post(&router, "/api/simulation/stop", "").await;
    assert_eq!(json["success"], true);
    assert!(!state.simulation.is_running().await);

    let (_, json) = post(&router, "/api/simulation/stop", "").await;
    assert_eq!(json["success"], false);
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test]
async fn test_commands_publish_tank_updates() {
    let state = make_test_state();
    let mut rx = state.subscribe();
    let router = build_router(Arc::clone(&state));

    post(&router, "/api/control/fill", "").await;

    let event = rx.recv().await.unwrap();
    assert_eq!(event.topic(), "tank_update");
    assert!(matches!(event, TwinEvent::TankUpdate(s) if s.is_filling));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let router = build_router(make_test_state());
    let response = router
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
