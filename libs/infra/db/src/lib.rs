// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENCE ADAPTER (GRID-X)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ACCESO A LIBSQL PARA CUENTAS, JOBS Y WORKERS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;
pub mod unit_of_work;

pub use client::GridDbClient;
pub use errors::DbError;
pub use repositories::{AccountRepository, JobRepository, WorkerRepository, WorkerSnapshot};
pub use unit_of_work::UnitOfWork;
