// [apps/coordinator/src/errors.rs]
//! Traduce la taxonomia compartida (`gridx_domain_models::ErrorKind`) y los
//! fallos de persistencia a respuestas HTTP (400/402/404/5xx).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gridx_domain_models::{ErrorKind, ModelError};
use gridx_infra_db::DbError;
use serde_json::json;
use tracing::error;

pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::WorkerLost | ErrorKind::Timeout | ErrorKind::ExecutionFailed => StatusCode::OK,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        Self { kind: e.kind, message: e.message }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        let kind = match &e {
            DbError::AccountNotFound(_) | DbError::JobNotFound(_) | DbError::WorkerNotFound(_) => ErrorKind::NotFound,
            DbError::InsufficientCredits => ErrorKind::InsufficientCredits,
            DbError::Unauthenticated => ErrorKind::Unauthenticated,
            DbError::InvalidStateTransition { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        };
        if matches!(kind, ErrorKind::Internal) {
            error!("❌ [API_FAULT]: Unhandled persistence failure surfaced to caller: {}", e);
        }
        Self { kind, message: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": error_code(self.kind),
            "message": self.message,
        }));
        (self.status(), body).into_response()
    }
}

fn error_code(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput => "invalid_input",
        ErrorKind::Unauthenticated => "unauthenticated",
        ErrorKind::InsufficientCredits => "insufficient_credits",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Conflict => "conflict",
        ErrorKind::WorkerLost => "worker_lost",
        ErrorKind::Timeout => "timeout",
        ErrorKind::ExecutionFailed => "execution_failed",
        ErrorKind::Internal => "internal",
    }
}
