// [apps/coordinator/src/state/mod.rs]
/*!
 * Estado compartido del coordinador: la placa base donde se conectan la
 * persistencia (C1/C3), el registro de sesiones en memoria (C2) y el
 * scheduler (C4). Una unica instancia, pasada por referencia (`Arc`-backed,
 * `Clone` barato) a handlers y daemons — no hay singleton de proceso.
 */

pub mod registry;

use crate::config::Config;
use crate::scheduler::Scheduler;
use gridx_infra_db::{AccountRepository, GridDbClient, JobRepository, WorkerRepository};
use registry::WorkerRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: GridDbClient,
    pub accounts: Arc<AccountRepository>,
    pub jobs: Arc<JobRepository>,
    pub workers: Arc<WorkerRepository>,
    pub registry: Arc<WorkerRegistry>,
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: GridDbClient, config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            accounts: Arc::new(AccountRepository::new(db.clone())),
            jobs: Arc::new(JobRepository::new(db.clone())),
            workers: Arc::new(WorkerRepository::new(db.clone())),
            registry: Arc::new(WorkerRegistry::new()),
            scheduler: Arc::new(Scheduler::new(config.dispatch_skip_attempts)),
            db,
            config,
        }
    }
}
