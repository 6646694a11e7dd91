// [apps/coordinator/src/routes.rs]
/*!
 * Topologia HTTP del coordinador: la API de sumision (C6) y el socket
 * de sesion de worker (C5) conviven en el mismo router, compartiendo
 * un solo `AppState`.
 */

use crate::handlers::{session, submission};
use crate::state::AppState;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// La API de sumision REST (C6): `--http-port` del lado del operador.
pub fn build_submission_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(submission::health))
        .route("/jobs", post(submission::submit_job))
        .route("/jobs/:id", get(submission::get_job))
        .route("/workers", get(submission::list_workers))
        .route("/credits/:id", get(submission::get_balance))
        .layer(cors())
        .with_state(state)
}

/// El socket de sesion de worker (C5): `--stream-port` del lado del
/// operador, separado del puerto REST para que un firewall pueda
/// aislar el trafico de control del trafico de datos de sumision.
pub fn build_session_router(state: AppState) -> Router {
    Router::new().route("/ws/worker", get(session::upgrade)).layer(cors()).with_state(state)
}
