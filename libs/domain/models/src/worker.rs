// [libs/domain/models/src/worker.rs]
//! Tipos del lado worker: las capacidades que un worker anuncia al
//! autenticarse y la vista publica que expone `GET /workers`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capacidades declaradas por un worker en su mensaje `auth` inicial;
/// el scheduler las compara contra los requisitos de cada job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    pub cpu_cores: u32,
    pub accelerator_count: u32,
    pub memory_mb: u64,
}

impl WorkerCapabilities {
    pub fn satisfies(&self, requirements: &JobRequirements) -> bool {
        self.cpu_cores >= requirements.cpu_cores
            && self.memory_mb >= requirements.memory_mb
            && (!requirements.accelerator_required || self.accelerator_count > 0)
    }
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self { cpu_cores: 1, accelerator_count: 0, memory_mb: 512 }
    }
}

/// Subconjunto de los limites de un job que el scheduler usa para
/// emparejar contra las capacidades de un worker.
#[derive(Debug, Clone, Copy)]
pub struct JobRequirements {
    pub cpu_cores: u32,
    pub memory_mb: u64,
    pub accelerator_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Offline,
}

/// Vista publica de una sesion de worker registrada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSessionView {
    pub worker_id: Uuid,
    pub owner: String,
    pub status: WorkerStatus,
    pub capabilities: WorkerCapabilities,
    pub last_heartbeat: DateTime<Utc>,
    pub current_job: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities_satisfy_a_minimal_job() {
        let caps = WorkerCapabilities::default();
        let requirements = JobRequirements { cpu_cores: 1, memory_mb: 256, accelerator_required: false };
        assert!(caps.satisfies(&requirements));
    }

    #[test]
    fn accelerator_requirement_rejects_workers_without_one() {
        let caps = WorkerCapabilities { cpu_cores: 4, accelerator_count: 0, memory_mb: 4096 };
        let requirements = JobRequirements { cpu_cores: 1, memory_mb: 128, accelerator_required: true };
        assert!(!caps.satisfies(&requirements));
    }

    #[test]
    fn insufficient_memory_rejects_the_match() {
        let caps = WorkerCapabilities { cpu_cores: 8, accelerator_count: 0, memory_mb: 256 };
        let requirements = JobRequirements { cpu_cores: 1, memory_mb: 512, accelerator_required: false };
        assert!(!caps.satisfies(&requirements));
    }
}
