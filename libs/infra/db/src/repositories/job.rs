// [libs/infra/db/src/repositories/job.rs]
/*!
 * Repositorio del ciclo de vida de un Job: creacion, lectura, despacho
 * atomico y cierre terminal. Las transiciones de estado pasan siempre
 * por `JobState::can_transition_to`, de modo que una fila nunca queda
 * en un estado que el modelo de dominio no autoriza.
 */

use crate::errors::DbError;
use crate::GridDbClient;
use chrono::{DateTime, Utc};
use gridx_domain_models::job::{ExecutionLimits, Job, JobState};
use libsql::{params, Row};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct JobRepository {
    client: GridDbClient,
}

impl JobRepository {
    pub fn new(client: GridDbClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, job))]
    pub async fn create(&self, job: &Job) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO jobs (id, submitter, language, code, wall_timeout_seconds, memory_mb, cpu_cores, accelerator_required, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.id.to_string(),
                job.submitter.clone(),
                job.language.clone(),
                job.code.clone(),
                job.limits.wall_timeout_seconds as i64,
                job.limits.memory_mb as i64,
                job.limits.cpu_cores as i64,
                job.limits.accelerator_required,
                state_to_str(job.state),
                job.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(SELECT_JOB_COLUMNS, params![id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_job(row),
            None => Err(DbError::JobNotFound(id.to_string())),
        }
    }

    pub async fn list_by_submitter(&self, submitter: &str) -> Result<Vec<Job>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("{SELECT_JOB_COLUMNS} WHERE submitter = ?1 ORDER BY created_at DESC");
        let mut rows = conn.query(&sql, params![submitter]).await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(map_row_to_job(row)?);
        }
        Ok(jobs)
    }

    /// Asigna atomicamente un job especifico, ya elegido por el
    /// scheduler en memoria (fila FIFO + `Registry.pick_idle`), al
    /// worker dado, incrementando su contador de intentos de despacho.
    /// Vuelve a comprobar dentro de la transaccion que el job sigue en
    /// `queued`; si otro dispatcher gano la carrera, devuelve `None`.
    #[instrument(skip(self))]
    pub async fn assign_to_worker(&self, job_id: Uuid, worker_id: Uuid) -> Result<Option<Job>, DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        let mut rows = tx
            .query(&format!("{SELECT_JOB_COLUMNS} WHERE id = ?1 AND state = 'queued'"), params![job_id.to_string()])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let job = map_row_to_job(row)?;
        drop(rows);

        tx.execute(
            "UPDATE jobs SET state = 'assigned', assigned_worker = ?1, assigned_at = ?2, dispatch_attempts = dispatch_attempts + 1
             WHERE id = ?3",
            params![worker_id.to_string(), Utc::now().to_rfc3339(), job.id.to_string()],
        )
        .await?;

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        info!("📦 [DISPATCH]: Job [{}] assigned to worker [{}].", job.id, worker_id);
        Ok(Some(Job { state: JobState::Assigned, assigned_worker: Some(worker_id), ..job }))
    }

    /// Ids de jobs en cola en orden de llegada; usado para reconstruir
    /// la fila FIFO en memoria del scheduler al arrancar el coordinador.
    pub async fn list_queued_ordered(&self) -> Result<Vec<Uuid>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT id FROM jobs WHERE state = 'queued' ORDER BY created_at ASC", ())
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            ids.push(Uuid::parse_str(&raw).map_err(|e| DbError::MappingError(e.to_string()))?);
        }
        Ok(ids)
    }

    /// Mueve un job a `Running` tras recibir el `ack` del worker.
    #[instrument(skip(self))]
    pub async fn mark_running(&self, id: Uuid) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        let mut rows = tx.query("SELECT state FROM jobs WHERE id = ?1", params![id.to_string()]).await?;
        let Some(row) = rows.next().await? else {
            return Err(DbError::JobNotFound(id.to_string()));
        };
        let current = str_to_state(&row.get::<String>(0)?)?;
        drop(rows);

        if !current.can_transition_to(JobState::Running) {
            return Err(DbError::InvalidStateTransition {
                from: format!("{current:?}"),
                to: "Running".to_string(),
            });
        }

        tx.execute("UPDATE jobs SET state = 'running' WHERE id = ?1", params![id.to_string()]).await?;
        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }

    /// Devuelve un job a la cola (worker perdido, heartbeat expirado)
    /// sin tocar su contador de intentos; el llamador decide si ese
    /// contador ya agoto el limite de reintentos.
    #[instrument(skip(self))]
    pub async fn requeue(&self, id: Uuid) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let updated = conn
            .execute(
                "UPDATE jobs SET state = 'queued', assigned_worker = NULL, assigned_at = NULL
                 WHERE id = ?1 AND state IN ('assigned', 'running')",
                params![id.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::InvalidStateTransition { from: "?".into(), to: "queued".into() });
        }
        warn!("↩️ [REQUEUE]: Job [{}] returned to the queue.", id);
        Ok(())
    }

    #[instrument(skip(self, stdout, stderr))]
    pub async fn complete(&self, id: Uuid, exit_code: i32, stdout: String, stderr: String) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let state = if exit_code == 0 { "completed" } else { "failed" };
        let updated = conn
            .execute(
                "UPDATE jobs SET state = ?1, exit_code = ?2, stdout = ?3, stderr = ?4, completed_at = ?5
                 WHERE id = ?6 AND state = 'running'",
                params![state, exit_code, stdout, stderr, Utc::now().to_rfc3339(), id.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::InvalidStateTransition { from: "?".into(), to: state.into() });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fail(&self, id: Uuid, reason: &str) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let updated = conn
            .execute(
                "UPDATE jobs SET state = 'failed', failure_reason = ?1, completed_at = ?2
                 WHERE id = ?3 AND state IN ('assigned', 'running')",
                params![reason, Utc::now().to_rfc3339(), id.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::InvalidStateTransition { from: "?".into(), to: "failed".into() });
        }
        Ok(())
    }

    pub async fn dispatch_attempts(&self, id: Uuid) -> Result<u32, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT dispatch_attempts FROM jobs WHERE id = ?1", params![id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u32),
            None => Err(DbError::JobNotFound(id.to_string())),
        }
    }

    /// Jobs `running` cuyo tiempo transcurrido desde `assigned_at`
    /// supera su propio `wall_timeout_seconds`; candidatos para el
    /// reaper de timeout: limite de pared propio de cada job.
    pub async fn find_timed_out(&self) -> Result<Vec<Uuid>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id FROM jobs
                 WHERE state = 'running' AND assigned_at IS NOT NULL
                 AND (unixepoch('now') - unixepoch(assigned_at)) > wall_timeout_seconds",
                (),
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            if let Ok(id) = Uuid::parse_str(&raw) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Jobs asignados a workers cuyo ultimo latido quedo por detras del
    /// umbral dado; candidatos para el barrido de liveness.
    pub async fn find_stale_assigned(&self, threshold: DateTime<Utc>) -> Result<Vec<Uuid>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT jobs.id FROM jobs
                 JOIN workers ON workers.worker_id = jobs.assigned_worker
                 WHERE jobs.state IN ('assigned', 'running') AND workers.last_heartbeat < ?1",
                params![threshold.to_rfc3339()],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            if let Ok(id) = Uuid::parse_str(&raw) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

}

const SELECT_JOB_COLUMNS: &str = "SELECT id, submitter, language, code, wall_timeout_seconds, memory_mb,
    cpu_cores, accelerator_required, state, assigned_worker, stdout, stderr, exit_code, created_at, completed_at FROM jobs";

fn map_row_to_job(row: Row) -> Result<Job, DbError> {
    let id = Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| DbError::MappingError(e.to_string()))?;
    let assigned_worker: Option<String> = row.get(9)?;
    let created_at_raw: String = row.get(13)?;
    let completed_at_raw: Option<String> = row.get(14)?;

    Ok(Job {
        id,
        submitter: row.get(1)?,
        language: row.get(2)?,
        code: row.get(3)?,
        limits: ExecutionLimits {
            wall_timeout_seconds: row.get::<i64>(4)? as u64,
            memory_mb: row.get::<i64>(5)? as u64,
            cpu_cores: row.get::<i64>(6)? as u32,
            accelerator_required: row.get::<i64>(7)? != 0,
        },
        state: str_to_state(&row.get::<String>(8)?)?,
        assigned_worker: assigned_worker
            .map(|raw| Uuid::parse_str(&raw))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        stdout: row.get(10)?,
        stderr: row.get(11)?,
        exit_code: row.get(12)?,
        created_at: parse_timestamp(&created_at_raw)?,
        completed_at: completed_at_raw.map(|raw| parse_timestamp(&raw)).transpose()?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(e.to_string()))
}

fn state_to_str(state: JobState) -> &'static str {
    match state {
        JobState::Queued => "queued",
        JobState::Assigned => "assigned",
        JobState::Running => "running",
        JobState::Completed => "completed",
        JobState::Failed => "failed",
        JobState::Cancelled => "cancelled",
    }
}

fn str_to_state(raw: &str) -> Result<JobState, DbError> {
    match raw {
        "queued" => Ok(JobState::Queued),
        "assigned" => Ok(JobState::Assigned),
        "running" => Ok(JobState::Running),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        "cancelled" => Ok(JobState::Cancelled),
        other => Err(DbError::MappingError(format!("unknown job state: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_job() -> Job {
        Job {
            id: Uuid::new_v4(),
            submitter: "alice".to_string(),
            language: "python".to_string(),
            code: "print('hi')".to_string(),
            limits: ExecutionLimits::default(),
            state: JobState::Queued,
            assigned_worker: None,
            stdout: None,
            stderr: None,
            exit_code: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    async fn test_client() -> GridDbClient {
        GridDbClient::connect("file:job_repo_test?mode=memory&cache=shared", None)
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let client = test_client().await;
        let repo = JobRepository::new(client);
        let job = sample_job();
        repo.create(&job).await.unwrap();

        let fetched = repo.get(job.id).await.unwrap();
        assert_eq!(fetched.submitter, "alice");
        assert_eq!(fetched.state, JobState::Queued);
    }

    #[tokio::test]
    async fn assign_to_worker_returns_none_for_unknown_job() {
        let client = test_client().await;
        let repo = JobRepository::new(client);
        let claimed = repo.assign_to_worker(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn assign_to_worker_moves_a_queued_job_to_assigned() {
        let client = test_client().await;
        let repo = JobRepository::new(client);
        let job = sample_job();
        repo.create(&job).await.unwrap();

        let worker_id = Uuid::new_v4();
        let claimed = repo.assign_to_worker(job.id, worker_id).await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.state, JobState::Assigned);
        assert_eq!(claimed.assigned_worker, Some(worker_id));
    }

    #[tokio::test]
    async fn list_queued_ordered_reflects_creation_order() {
        let client = test_client().await;
        let repo = JobRepository::new(client);
        let job = sample_job();
        repo.create(&job).await.unwrap();

        let queued = repo.list_queued_ordered().await.unwrap();
        assert_eq!(queued, vec![job.id]);
    }
}
