// [libs/infra/db/src/repositories/ledger.rs]
/*!
 * Repositorio de cuentas y movimientos de credito.
 *
 * Toda operacion que mueve saldo (debito por sumision, credito por
 * reembolso) corre dentro de una transaccion libSQL que tambien
 * escribe una fila en `ledger_entries`: el saldo de una cuenta siempre
 * es reconstruible sumando su historial de movimientos, y nunca se
 * comete un debito que dejaria el saldo por debajo de cero.
 */

use crate::errors::DbError;
use crate::GridDbClient;
use gridx_domain_ledger::Amount;
use libsql::params;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntryKind {
    Debit,
    Credit,
}

impl LedgerEntryKind {
    fn as_str(self) -> &'static str {
        match self {
            LedgerEntryKind::Debit => "debit",
            LedgerEntryKind::Credit => "credit",
        }
    }
}

pub struct AccountRepository {
    client: GridDbClient,
}

impl AccountRepository {
    pub fn new(client: GridDbClient) -> Self {
        Self { client }
    }

    fn hash_secret(secret: &str) -> String {
        let digest = Sha256::digest(secret.as_bytes());
        hex::encode(digest)
    }

    /// Crea la cuenta con el saldo inicial configurado si no existe; no
    /// toca el saldo de una cuenta ya presente.
    #[instrument(skip(self))]
    pub async fn ensure_account(&self, account_id: &str, starting_balance: Amount) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO accounts (account_id, balance_micros) VALUES (?1, ?2)",
                params![account_id, starting_balance.as_micros()],
            )
            .await?;

        if inserted > 0 {
            info!("🪪 [LEDGER]: Account [{}] created with starting balance {}.", account_id, starting_balance);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn balance(&self, account_id: &str) -> Result<Amount, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT balance_micros FROM accounts WHERE account_id = ?1", params![account_id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Amount::from_micros(row.get::<i64>(0)?)),
            None => Err(DbError::AccountNotFound(account_id.to_string())),
        }
    }

    /// Establece el secreto de autenticacion de un worker en su primer
    /// uso (el protocolo "trust on first use"); no lo sobreescribe si
    /// ya hay uno registrado.
    #[instrument(skip(self, secret))]
    pub async fn set_auth_on_first_use(&self, account_id: &str, secret: &str) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let hashed = Self::hash_secret(secret);
        conn.execute(
            "UPDATE accounts SET secret_hash = ?1 WHERE account_id = ?2 AND secret_hash IS NULL",
            params![hashed, account_id],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, secret))]
    pub async fn verify_auth(&self, account_id: &str, secret: &str) -> Result<bool, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT secret_hash FROM accounts WHERE account_id = ?1", params![account_id])
            .await?;

        let Some(row) = rows.next().await? else {
            return Err(DbError::AccountNotFound(account_id.to_string()));
        };

        match row.get::<Option<String>>(0)? {
            None => Ok(true),
            Some(stored) => Ok(stored == Self::hash_secret(secret)),
        }
    }

    /// Debita una cuenta y registra el movimiento atomicamente. Rechaza
    /// la operacion entera si el saldo caeria por debajo de cero.
    #[instrument(skip(self))]
    pub async fn debit(&self, account_id: &str, amount: Amount, job_id: Option<Uuid>) -> Result<Amount, DbError> {
        self.apply_entry(account_id, amount, job_id, LedgerEntryKind::Debit).await
    }

    /// Acredita una cuenta (reembolso, recarga) y registra el
    /// movimiento atomicamente.
    #[instrument(skip(self))]
    pub async fn credit(&self, account_id: &str, amount: Amount, job_id: Option<Uuid>) -> Result<Amount, DbError> {
        self.apply_entry(account_id, amount, job_id, LedgerEntryKind::Credit).await
    }

    async fn apply_entry(
        &self,
        account_id: &str,
        amount: Amount,
        job_id: Option<Uuid>,
        kind: LedgerEntryKind,
    ) -> Result<Amount, DbError> {
        let conn = self.client.connection()?;
        let tx = conn.transaction().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        let mut rows = tx
            .query("SELECT balance_micros FROM accounts WHERE account_id = ?1", params![account_id])
            .await?;
        let current = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => return Err(DbError::AccountNotFound(account_id.to_string())),
        };
        drop(rows);

        let signed_micros = match kind {
            LedgerEntryKind::Debit => -amount.as_micros(),
            LedgerEntryKind::Credit => amount.as_micros(),
        };
        let next_balance = current
            .checked_add(signed_micros)
            .ok_or_else(|| DbError::MappingError("balance overflow".to_string()))?;

        if next_balance < 0 {
            warn!("⚠️ [LEDGER]: Rejecting {} for [{}]: would drive balance negative.", kind.as_str(), account_id);
            return Err(DbError::InsufficientCredits);
        }

        tx.execute(
            "UPDATE accounts SET balance_micros = ?1 WHERE account_id = ?2",
            params![next_balance, account_id],
        )
        .await?;

        tx.execute(
            "INSERT INTO ledger_entries (id, account_id, job_id, amount_micros, kind) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                account_id,
                job_id.map(|id| id.to_string()),
                signed_micros,
                kind.as_str(),
            ],
        )
        .await?;

        tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

        info!("💳 [LEDGER]: {} of {} applied to [{}], new balance {}.", kind.as_str(), amount, account_id, next_balance);
        Ok(Amount::from_micros(next_balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridDbClient;

    async fn test_client() -> GridDbClient {
        GridDbClient::connect("file:ledger_repo_test?mode=memory&cache=shared", None)
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn debit_rejects_when_it_would_go_negative() {
        let client = test_client().await;
        let repo = AccountRepository::new(client);
        repo.ensure_account("alice", Amount::ZERO).await.unwrap();
        repo.credit("alice", Amount::from_micros(1_000_000), None).await.unwrap();

        let result = repo.debit("alice", Amount::from_micros(2_000_000), None).await;
        assert!(matches!(result, Err(DbError::InsufficientCredits)));

        let balance = repo.balance("alice").await.unwrap();
        assert_eq!(balance.as_micros(), 1_000_000);
    }

    #[tokio::test]
    async fn first_use_locks_in_the_secret() {
        let client = test_client().await;
        let repo = AccountRepository::new(client);
        repo.ensure_account("worker-1", Amount::ZERO).await.unwrap();

        assert!(repo.verify_auth("worker-1", "anything").await.unwrap());
        repo.set_auth_on_first_use("worker-1", "s3cret").await.unwrap();

        assert!(repo.verify_auth("worker-1", "s3cret").await.unwrap());
        assert!(!repo.verify_auth("worker-1", "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_account_applies_starting_balance_only_once() {
        let client = test_client().await;
        let repo = AccountRepository::new(client);
        repo.ensure_account("alice", Amount::from_decimal(100.0)).await.unwrap();
        repo.debit("alice", Amount::from_decimal(1.0), None).await.unwrap();

        repo.ensure_account("alice", Amount::from_decimal(100.0)).await.unwrap();
        let balance = repo.balance("alice").await.unwrap();
        assert_eq!(balance.as_decimal(), 99.0);
    }
}
