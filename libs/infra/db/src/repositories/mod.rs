// [libs/infra/db/src/repositories/mod.rs]
//! Barrel de repositorios: un modulo por agregado persistido.

pub mod job;
pub mod ledger;
pub mod worker;

pub use job::JobRepository;
pub use ledger::AccountRepository;
pub use worker::{WorkerRepository, WorkerSnapshot};
