// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS BARREL (V1.0 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICION UNICA DE TIPOS COMPARTIDOS (SSoT)
 *
 * Todo lo que cruza un limite de proceso en Grid-X (HTTP, websocket,
 * fila de persistencia) pasa por un tipo definido aqui: coordinador y
 * trabajador comparten esta crate para no divergir en la forma del
 * mensaje.
 * =================================================================
 */

pub mod account;
pub mod error_kind;
pub mod job;
pub mod protocol;
pub mod worker;

pub use account::{validate_account_id, Account};
pub use error_kind::{ErrorKind, ModelError};
pub use job::{ExecutionLimits, Job, JobState, JobView};
pub use protocol::SessionMessage;
pub use worker::{JobRequirements, WorkerCapabilities, WorkerSessionView, WorkerStatus};
