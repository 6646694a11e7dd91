// [apps/worker/src/lib.rs]
pub mod config;
pub mod engine;
pub mod executor;

pub mod prelude {
    pub use crate::config::WorkerArgs;
    pub use crate::engine::WorkerEngine;
}
