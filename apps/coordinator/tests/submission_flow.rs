// [apps/coordinator/tests/submission_flow.rs]
//! Pruebas de integracion de la API de sumision (C6): el router
//! completo montado sobre una base libSQL en memoria, ejercitado con
//! `tower::ServiceExt::oneshot` en vez de abrir un socket real.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use gridx_coordinator::config::Config;
use gridx_coordinator::routes::build_submission_router;
use gridx_coordinator::state::AppState;
use gridx_infra_db::GridDbClient;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state(db_name: &str) -> AppState {
    let url = format!("file:{db_name}?mode=memory&cache=shared");
    let db = GridDbClient::connect(&url, None).await.expect("connect");
    let config = Config {
        http_port: 0,
        stream_port: 0,
        database_url: url,
        database_token: None,
        starting_balance: gridx_domain_ledger::Amount::from_decimal(10.0),
        job_cost: gridx_domain_ledger::Amount::from_decimal(1.0),
        worker_reward: gridx_domain_ledger::Amount::from_decimal(0.8),
        heartbeat_interval: std::time::Duration::from_secs(15),
        stale_threshold: std::time::Duration::from_secs(90),
        offline_eviction_threshold: std::time::Duration::from_secs(86400),
        default_timeout: std::time::Duration::from_secs(300),
        max_code_length: 1024 * 1024,
        max_output_bytes: 64 * 1024,
        requeue_attempts: 3,
        dispatch_skip_attempts: 5,
    };
    AppState::new(db, config)
}

async fn body_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("readable body");
    serde_json::from_slice(&bytes).expect("valid json")
}

#[tokio::test]
async fn submit_job_debits_the_submitter_and_queues_the_job() {
    let state = test_state("submission_flow_happy_path").await;
    let app = build_submission_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(json!({"submitter": "alice", "code": "print('hi')", "language": "python"}).to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response.into_body()).await;
    let job_id = payload["job_id"].as_str().expect("job_id present").to_string();

    let balance_request = Request::builder().uri("/credits/alice").body(Body::empty()).unwrap();
    let balance_response = app.clone().oneshot(balance_request).await.unwrap();
    let balance_payload = body_json(balance_response.into_body()).await;
    assert_eq!(balance_payload["balance"], "9.000000");

    let job_request = Request::builder().uri(format!("/jobs/{job_id}")).body(Body::empty()).unwrap();
    let job_response = app.clone().oneshot(job_request).await.unwrap();
    assert_eq!(job_response.status(), StatusCode::OK);
    let job_payload = body_json(job_response.into_body()).await;
    assert_eq!(job_payload["state"], "queued");

    assert_eq!(state.scheduler.queue_depth(), 1);
}

#[tokio::test]
async fn submit_job_rejects_a_submitter_without_enough_credit() {
    let state = test_state("submission_flow_insufficient_credit").await;
    let app = build_submission_router(state.clone());

    // Agota el saldo inicial con una primera sumision legitima.
    for _ in 0..10 {
        let request = Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(Body::from(json!({"submitter": "bob", "code": "print(1)", "language": "python"}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(json!({"submitter": "bob", "code": "print(1)", "language": "python"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_job_rejects_unsupported_languages() {
    let state = test_state("submission_flow_bad_language").await;
    let app = build_submission_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(json!({"submitter": "carol", "code": "fn main() {}", "language": "rust"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_workers_reflects_registered_sessions() {
    let state = test_state("submission_flow_workers").await;
    let app = build_submission_router(state.clone());

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    state.registry.register(
        uuid::Uuid::new_v4(),
        "dave".to_string(),
        gridx_domain_models::worker::WorkerCapabilities::default(),
        tx,
    );

    let request = Request::builder().uri("/workers").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let payload = body_json(response.into_body()).await;
    assert_eq!(payload["workers"].as_array().unwrap().len(), 1);
}
