// [libs/infra/db/src/errors.rs]
//! Catalogo semantico de fallos de persistencia. Cada variante nombra
//! la causa raiz para que el kernel del coordinador pueda decidir si
//! un fallo es recuperable (reintento) o fatal (apagado).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection_error: {0}")]
    ConnectionError(String),

    #[error("configuration_error: {0}")]
    ConfigurationError(String),

    #[error("query_error: {0}")]
    QueryError(#[from] libsql::Error),

    #[error("mapping_error: {0}")]
    MappingError(String),

    #[error("transaction_error: {0}")]
    TransactionError(String),

    #[error("account_not_found: {0}")]
    AccountNotFound(String),

    #[error("job_not_found: {0}")]
    JobNotFound(String),

    #[error("worker_not_found: {0}")]
    WorkerNotFound(String),

    #[error("insufficient_credits")]
    InsufficientCredits,

    #[error("invalid_state_transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("unauthenticated")]
    Unauthenticated,
}
