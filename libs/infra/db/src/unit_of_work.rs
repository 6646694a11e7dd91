// [libs/infra/db/src/unit_of_work.rs]
/*!
 * El unico lugar donde una mutacion de saldo y una mutacion de fila de Job
 * comparten una transaccion. Dos flujos lo usan: la sumision (debito +
 * creacion de Job) y el cierre de un job completado (credito al dueno del
 * worker + transicion terminal). Si cualquier paso falla el `Transaction`
 * se descarta sin `commit` y libSQL revierte todo lo escrito hasta ahi.
 */

use crate::errors::DbError;
use crate::GridDbClient;
use chrono::Utc;
use gridx_domain_ledger::Amount;
use gridx_domain_models::job::Job;
use libsql::{params, Transaction};
use tracing::warn;
use uuid::Uuid;

pub struct UnitOfWork {
    tx: Transaction,
}

impl UnitOfWork {
    pub(crate) async fn begin(client: &GridDbClient) -> Result<Self, DbError> {
        let conn = client.connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(Self { tx })
    }

    async fn current_balance(&self, account_id: &str) -> Result<i64, DbError> {
        let mut rows = self
            .tx
            .query("SELECT balance_micros FROM accounts WHERE account_id = ?1", params![account_id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Err(DbError::AccountNotFound(account_id.to_string())),
        }
    }

    /// Crea la cuenta con el saldo inicial si aun no existe; no-op si ya existe.
    pub async fn ensure_account(&self, account_id: &str, starting_balance: Amount) -> Result<(), DbError> {
        self.tx
            .execute(
                "INSERT OR IGNORE INTO accounts (account_id, balance_micros) VALUES (?1, ?2)",
                params![account_id, starting_balance.as_micros()],
            )
            .await?;
        Ok(())
    }

    /// Debita dentro de la transaccion. Devuelve `InsufficientCredits` (sin
    /// tocar ninguna fila) si el resultado seria negativo; el llamador debe
    /// dejar caer el `UnitOfWork` sin llamar `commit` para descartar
    /// cualquier mutacion previa de este mismo unit-of-work.
    pub async fn debit(&self, account_id: &str, amount: Amount, job_id: Option<Uuid>) -> Result<(), DbError> {
        self.apply_entry(account_id, amount, job_id, "debit", -amount.as_micros()).await
    }

    pub async fn credit(&self, account_id: &str, amount: Amount, job_id: Option<Uuid>) -> Result<(), DbError> {
        self.apply_entry(account_id, amount, job_id, "credit", amount.as_micros()).await
    }

    async fn apply_entry(
        &self,
        account_id: &str,
        amount: Amount,
        job_id: Option<Uuid>,
        kind: &str,
        signed_micros: i64,
    ) -> Result<(), DbError> {
        let current = self.current_balance(account_id).await?;
        let next = current
            .checked_add(signed_micros)
            .ok_or_else(|| DbError::MappingError("balance overflow".to_string()))?;

        if next < 0 {
            warn!("⚠️ [LEDGER_UOW]: {} of {} for [{}] would drive balance negative.", kind, amount, account_id);
            return Err(DbError::InsufficientCredits);
        }

        self.tx
            .execute("UPDATE accounts SET balance_micros = ?1 WHERE account_id = ?2", params![next, account_id])
            .await?;
        self.tx
            .execute(
                "INSERT INTO ledger_entries (id, account_id, job_id, amount_micros, kind) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    account_id,
                    job_id.map(|id| id.to_string()),
                    signed_micros,
                    kind,
                ],
            )
            .await?;
        Ok(())
    }

    /// Inserta el Job en estado `queued`, como parte de la sumision.
    pub async fn create_job(&self, job: &Job) -> Result<(), DbError> {
        self.tx
            .execute(
                "INSERT INTO jobs (id, submitter, language, code, wall_timeout_seconds, memory_mb, cpu_cores, accelerator_required, state, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'queued', ?9)",
                params![
                    job.id.to_string(),
                    job.submitter.clone(),
                    job.language.clone(),
                    job.code.clone(),
                    job.limits.wall_timeout_seconds as i64,
                    job.limits.memory_mb as i64,
                    job.limits.cpu_cores as i64,
                    job.limits.accelerator_required,
                    job.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Cierra un job `running` en su estado terminal (`completed` si
    /// `exit_code == 0`, `failed` en otro caso), junto con el credito que lo
    /// acompana (ya aplicado o deliberadamente omitido por el llamador).
    pub async fn complete_job(&self, id: Uuid, exit_code: i32, stdout: &str, stderr: &str) -> Result<(), DbError> {
        let state = if exit_code == 0 { "completed" } else { "failed" };
        let updated = self
            .tx
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

    /// Marca un job `failed` con una razon sintetica (timeout, worker
    /// perdido tras agotar reintentos) sin que medie movimiento de credito.
    pub async fn fail_job(&self, id: Uuid, reason: &str) -> Result<(), DbError> {
        let updated = self
            .tx
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

    pub async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridDbClient;
    use gridx_domain_models::job::{ExecutionLimits, JobState};

    async fn test_client() -> GridDbClient {
        GridDbClient::connect("file:uow_test?mode=memory&cache=shared", None).await.expect("connect")
    }

    fn sample_job(submitter: &str) -> Job {
        Job {
            id: Uuid::new_v4(),
            submitter: submitter.to_string(),
            language: "python".to_string(),
            code: "print(1)".to_string(),
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

    #[tokio::test]
    async fn submission_debit_and_job_creation_commit_together() {
        let client = test_client().await;
        let uow = client.unit_of_work().await.unwrap();
        uow.ensure_account("alice", Amount::from_decimal(100.0)).await.unwrap();
        let job = sample_job("alice");
        uow.debit("alice", Amount::from_decimal(1.0), Some(job.id)).await.unwrap();
        uow.create_job(&job).await.unwrap();
        uow.commit().await.unwrap();

        let mut rows = client
            .connection()
            .unwrap()
            .query("SELECT balance_micros FROM accounts WHERE account_id = 'alice'", ())
            .await
            .unwrap();
        let balance: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(balance, 99_000_000);
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_no_job_row_behind() {
        let client = test_client().await;
        let uow = client.unit_of_work().await.unwrap();
        uow.ensure_account("bob", Amount::from_decimal(0.5)).await.unwrap();
        let job = sample_job("bob");
        let debit_result = uow.debit("bob", Amount::from_decimal(1.0), Some(job.id)).await;
        assert!(matches!(debit_result, Err(DbError::InsufficientCredits)));
        drop(uow);

        let mut rows = client.connection().unwrap().query("SELECT COUNT(*) FROM jobs WHERE submitter = 'bob'", ()).await.unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }
}
