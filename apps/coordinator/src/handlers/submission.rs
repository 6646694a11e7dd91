// [apps/coordinator/src/handlers/submission.rs]
/*!
 * Submission API (C6): el unico surtido request/response del coordinador.
 * `submit_job` es el unico punto de entrada que toca tanto el Ledger como
 * el Job Store en la misma transaccion; todo lo demas es lectura pura.
 */

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use gridx_domain_ledger::Amount;
use gridx_domain_models::account::{validate_account_id, Account};
use gridx_domain_models::job::{ExecutionLimits, Job, JobState, JobView};
use gridx_domain_models::worker::WorkerSessionView;
use gridx_domain_models::{ErrorKind, ModelError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

/// Unico lenguaje soportado esta version.
const SUPPORTED_LANGUAGES: &[&str] = &["python"];

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub submitter: String,
    pub code: String,
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ts: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct WorkerListResponse {
    pub workers: Vec<WorkerSessionView>,
}

/// `POST /jobs`: valida, debita y encola dentro de una unica transaccion;
/// solo al confirmar esa transaccion se empuja el job al scheduler.
#[instrument(skip(state, payload), fields(submitter = %payload.submitter))]
pub async fn submit_job(State(state): State<AppState>, Json(payload): Json<SubmitJobRequest>) -> Result<impl IntoResponse, ApiError> {
    validate_account_id(&payload.submitter)?;

    if payload.code.is_empty() {
        return Err(ModelError::invalid_input("code must not be empty").into());
    }
    if payload.code.len() > state.config.max_code_length {
        return Err(ModelError::invalid_input(format!(
            "code exceeds the {} byte cap",
            state.config.max_code_length
        ))
        .into());
    }
    if !SUPPORTED_LANGUAGES.contains(&payload.language.as_str()) {
        return Err(ModelError::invalid_input(format!("unsupported language: {}", payload.language)).into());
    }

    let job = Job {
        id: Uuid::new_v4(),
        submitter: payload.submitter,
        language: payload.language,
        code: payload.code,
        limits: ExecutionLimits { wall_timeout_seconds: state.config.default_timeout.as_secs(), ..ExecutionLimits::default() },
        state: JobState::Queued,
        assigned_worker: None,
        stdout: None,
        stderr: None,
        exit_code: None,
        created_at: Utc::now(),
        completed_at: None,
    };

    let uow = state.db.unit_of_work().await?;
    uow.ensure_account(&job.submitter, state.config.starting_balance).await?;

    if let Err(e) = uow.debit(&job.submitter, state.config.job_cost, Some(job.id)).await {
        // El `UnitOfWork` se descarta aqui sin `commit`; libSQL revierte el
        // `ensure_account` que acabamos de aplicar en la misma transaccion.
        return Err(e.into());
    }

    uow.create_job(&job).await?;
    uow.commit().await?;

    // La cola de despacho es en memoria (un `VecDeque` tras un `Mutex`): no
    // tiene una via de fallo propia, asi que no existe aqui un estado
    // "comprometido pero no encolado" que compensar con un reembolso.
    state.scheduler.enqueue(job.id);

    info!("📝 [SUBMISSION]: Job [{}] queued for [{}].", job.id, job.submitter);
    Ok((StatusCode::OK, Json(SubmitJobResponse { job_id: job.id })))
}

/// `GET /jobs/{id}`.
#[instrument(skip(state))]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_uuid(&id)?;
    let job = state.jobs.get(job_id).await?;
    Ok(Json(JobView::from(job)))
}

/// `GET /credits/{id}`.
#[instrument(skip(state))]
pub async fn get_balance(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    validate_account_id(&id)?;
    let balance: Amount = state.accounts.balance(&id).await?;
    Ok(Json(Account { account_id: id, balance }))
}

/// `GET /workers`.
#[instrument(skip(state))]
pub async fn list_workers(State(state): State<AppState>) -> impl IntoResponse {
    Json(WorkerListResponse { workers: state.registry.snapshot() })
}

/// `GET /health`.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy", ts: Utc::now() })
}

fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
    let id = Uuid::parse_str(raw).map_err(|_| ModelError::invalid_input("id must be a v4 UUID"))?;
    if id.get_version() != Some(uuid::Version::Random) {
        return Err(ModelError::invalid_input("id must be a v4 UUID").into());
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_languages() {
        assert!(!SUPPORTED_LANGUAGES.contains(&"rust"));
        assert!(SUPPORTED_LANGUAGES.contains(&"python"));
    }

    #[test]
    fn parse_uuid_rejects_malformed_ids() {
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(parse_uuid(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn parse_uuid_rejects_non_v4_versions() {
        let v1_like = "c232ab00-9414-11ec-b3c8-9f6bdeced846";
        assert!(parse_uuid(v1_like).is_err());
    }
}
