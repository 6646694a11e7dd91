// [libs/infra/db/src/repositories/worker.rs]
/*!
 * Persistencia de la instantanea de cada sesion de worker: esta tabla
 * es la fuente de verdad que sobrevive a un reinicio del coordinador,
 * aunque el estado de enrutamiento en caliente vive en el Worker
 * Registry de `gridx-coordinator`.
 */

use crate::errors::DbError;
use crate::GridDbClient;
use chrono::{DateTime, Utc};
use gridx_domain_models::worker::{WorkerCapabilities, WorkerStatus};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct WorkerRepository {
    client: GridDbClient,
}

impl WorkerRepository {
    pub fn new(client: GridDbClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, capabilities))]
    pub async fn upsert(
        &self,
        worker_id: Uuid,
        owner: &str,
        capabilities: &WorkerCapabilities,
    ) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let capabilities_json =
            serde_json::to_string(capabilities).map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO workers (worker_id, owner, status, capabilities_json, last_heartbeat)
             VALUES (?1, ?2, 'idle', ?3, ?4)
             ON CONFLICT(worker_id) DO UPDATE SET
                 status = 'idle', capabilities_json = excluded.capabilities_json, last_heartbeat = excluded.last_heartbeat",
            params![worker_id.to_string(), owner, capabilities_json, Utc::now().to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    pub async fn touch_heartbeat(&self, worker_id: Uuid) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let updated = conn
            .execute(
                "UPDATE workers SET last_heartbeat = ?1 WHERE worker_id = ?2",
                params![Utc::now().to_rfc3339(), worker_id.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::WorkerNotFound(worker_id.to_string()));
        }
        Ok(())
    }

    pub async fn set_status(&self, worker_id: Uuid, status: WorkerStatus, current_job: Option<Uuid>) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE workers SET status = ?1, current_job = ?2 WHERE worker_id = ?3",
            params![
                status_to_str(status),
                current_job.map(|id| id.to_string()),
                worker_id.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn mark_offline(&self, worker_id: Uuid) -> Result<(), DbError> {
        self.set_status(worker_id, WorkerStatus::Offline, None).await
    }

    pub async fn list(&self) -> Result<Vec<WorkerSnapshot>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT worker_id, owner, status, capabilities_json, current_job, last_heartbeat FROM workers ORDER BY last_heartbeat DESC",
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row_to_snapshot(row)?);
        }
        Ok(out)
    }
}

/// Proyeccion de fila cruda; `apps/coordinator` la traduce a
/// `WorkerSessionView` para la API publica.
pub struct WorkerSnapshot {
    pub worker_id: Uuid,
    pub owner: String,
    pub status: WorkerStatus,
    pub capabilities: WorkerCapabilities,
    pub current_job: Option<Uuid>,
    pub last_heartbeat: DateTime<Utc>,
}

fn map_row_to_snapshot(row: Row) -> Result<WorkerSnapshot, DbError> {
    let worker_id = Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| DbError::MappingError(e.to_string()))?;
    let capabilities_json: String = row.get(3)?;
    let current_job_raw: Option<String> = row.get(4)?;
    let last_heartbeat_raw: String = row.get(5)?;

    Ok(WorkerSnapshot {
        worker_id,
        owner: row.get(1)?,
        status: str_to_status(&row.get::<String>(2)?)?,
        capabilities: serde_json::from_str(&capabilities_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        current_job: current_job_raw
            .map(|raw| Uuid::parse_str(&raw))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        last_heartbeat: DateTime::parse_from_rfc3339(&last_heartbeat_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DbError::MappingError(e.to_string()))?,
    })
}

fn status_to_str(status: WorkerStatus) -> &'static str {
    match status {
        WorkerStatus::Idle => "idle",
        WorkerStatus::Busy => "busy",
        WorkerStatus::Offline => "offline",
    }
}

fn str_to_status(raw: &str) -> Result<WorkerStatus, DbError> {
    match raw {
        "idle" => Ok(WorkerStatus::Idle),
        "busy" => Ok(WorkerStatus::Busy),
        "offline" => Ok(WorkerStatus::Offline),
        other => Err(DbError::MappingError(format!("unknown worker status: {other}"))),
    }
}
