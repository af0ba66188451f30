//! HTTP integration tests for the SeatWatch API
//!
//! Full handler dispatch through the Axum router with `oneshot`, backed by
//! the memory store and scripted oracle/notifier.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{scenario_slots, FakeOracle, Harness, RecordingNotifier, USER};
use seatwatch_core::store::RequestStore;
use seatwatch_core::RequestStatus;
use seatwatch_server::http::{build_router, HttpState};
use seatwatch_server::subsystems::monitor::MonitorContext;

struct TestApp {
    harness: Arc<Harness>,
    notifier: Arc<RecordingNotifier>,
    router: axum::Router,
}

/// Router over the harness store and oracle, so tests can inspect state.
fn make_app(oracle: FakeOracle) -> TestApp {
    let harness = Arc::new(Harness::new(oracle));
    let notifier = Arc::new(RecordingNotifier::default());

    let conversation = Arc::new(seatwatch_server::conversation::ConversationService::new(
        harness.store.clone(),
        Arc::new(seatwatch_core::StaticAllowList::new([USER])),
        Arc::new(seatwatch_core::StationCatalog::from_json(common::CATALOG).unwrap()),
        harness.oracle.clone(),
        Duration::from_secs(5),
    ));
    let monitor = Arc::new(MonitorContext::new(
        harness.store.clone(),
        harness.oracle.clone(),
        notifier.clone(),
        Duration::from_secs(5),
        None,
    ));
    let state = Arc::new(HttpState {
        conversation,
        monitor,
        store: harness.store.clone(),
    });

    TestApp {
        harness,
        notifier,
        router: build_router(state),
    }
}

async fn send(router: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn post_event(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ===========================================================================
// TEST 1: GET /version via oneshot: returns version and protocol
// ===========================================================================
#[tokio::test]
async fn test_version_endpoint_integration() {
    let app = make_app(FakeOracle::returning(Vec::new()));

    let req = Request::builder()
        .method("GET")
        .uri("/version")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["version"].is_string());
    assert_eq!(json["protocol"], "seatwatch/1");
}

// ===========================================================================
// TEST 2: GET /health: memory store reports healthy
// ===========================================================================
#[tokio::test]
async fn test_health_endpoint_integration() {
    let app = make_app(FakeOracle::returning(Vec::new()));

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

// ===========================================================================
// TEST 3: POST /events: unknown user gets 403 and nothing is stored
// ===========================================================================
#[tokio::test]
async fn test_events_denied() {
    let app = make_app(FakeOracle::returning(Vec::new()));

    let (status, json) = send(
        &app.router,
        post_event(json!({ "user_id": "stranger", "text": "/start" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["status"], "denied");

    assert!(app.harness.store.get("stranger").await.unwrap().is_none());
}

// ===========================================================================
// TEST 4: POST /events: conversation over HTTP, then POST /monitor/run
// ===========================================================================
#[tokio::test]
async fn test_events_then_monitor_run() {
    let app = make_app(FakeOracle::returning(scenario_slots()));

    let steps = [
        json!({ "user_id": USER, "text": "/start" }),
        json!({ "user_id": USER, "text": "Ankara" }),
        json!({ "user_id": USER, "text": "Es" }),
        json!({ "user_id": USER, "choice": "station_select_arr:Eskişehir" }),
        json!({ "user_id": USER, "choice": "calendar_day:2026-11-02" }),
        json!({ "user_id": USER, "choice": "multi_time_toggle:14:30" }),
        json!({ "user_id": USER, "choice": "multi_time_done" }),
        json!({ "user_id": USER, "choice": "seat_select:Ekonomi" }),
    ];
    for step in steps {
        let (status, json) = send(&app.router, post_event(step.clone())).await;
        assert_eq!(status, StatusCode::OK, "step {step} failed: {json}");
        assert_eq!(json["status"], "ok");
    }
    assert_eq!(app.harness.status().await, RequestStatus::Monitoring);

    let req = Request::builder()
        .method("POST")
        .uri("/monitor/run")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["report"]["matched"], 1);
    assert_eq!(json["report"]["notified"], 1);

    assert_eq!(app.notifier.sent().len(), 1);
    assert_eq!(app.harness.status().await, RequestStatus::Completed);
}

// ===========================================================================
// TEST 5: POST /events: missing text and choice is a 400
// ===========================================================================
#[tokio::test]
async fn test_events_bad_request() {
    let app = make_app(FakeOracle::returning(Vec::new()));

    let (status, json) = send(&app.router, post_event(json!({ "user_id": USER }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
}
