// [libs/domain/models/src/job.rs]
//! Job: unidad de codigo enviada por un submitter, su progresion de
//! estado y la vista publica que expone `GET /jobs/{id}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::worker::JobRequirements;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Estados desde los que una transaccion de ledger ya fue aplicada.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    /// Tabla de transiciones legales. Cada arista listada es la unica
    /// autorizada; cualquier otro par se rechaza.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Assigned)
                | (Assigned, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Assigned, Failed)
                | (Queued, Cancelled)
                | (Assigned, Queued)
                | (Running, Queued)
        )
    }
}

/// Limites de ejecucion declarados en la sumision; tambien sirven como
/// requisitos de hardware que el scheduler empareja contra un worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionLimits {
    pub wall_timeout_seconds: u64,
    pub memory_mb: u64,
    pub cpu_cores: u32,
    pub accelerator_required: bool,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self { wall_timeout_seconds: 300, memory_mb: 256, cpu_cores: 1, accelerator_required: false }
    }
}

impl ExecutionLimits {
    pub fn requirements(&self) -> JobRequirements {
        JobRequirements {
            cpu_cores: self.cpu_cores,
            memory_mb: self.memory_mb,
            accelerator_required: self.accelerator_required,
        }
    }
}

/// Registro completo de un Job, tal como vive en el Job Store (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub submitter: String,
    pub language: String,
    pub code: String,
    pub limits: ExecutionLimits,
    pub state: JobState,
    pub assigned_worker: Option<Uuid>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Vista publica de un Job (respuesta de `GET /jobs/{id}`); omite el
/// codigo fuente, que no es parte del contrato de lectura externo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: Uuid,
    pub submitter: String,
    pub language: String,
    pub state: JobState,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        JobView {
            id: job.id,
            submitter: job.submitter,
            language: job.language,
            state: job.state,
            stdout: job.stdout,
            stderr: job.stderr,
            exit_code: job.exit_code,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_can_only_advance_to_assigned_or_cancelled() {
        assert!(JobState::Queued.can_transition_to(JobState::Assigned));
        assert!(JobState::Queued.can_transition_to(JobState::Cancelled));
        assert!(!JobState::Queued.can_transition_to(JobState::Running));
        assert!(!JobState::Queued.can_transition_to(JobState::Completed));
    }

    #[test]
    fn terminal_states_never_accept_transitions() {
        for terminal in [JobState::Completed, JobState::Failed, JobState::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [JobState::Queued, JobState::Assigned, JobState::Running] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn worker_loss_requeues_from_assigned_or_running() {
        assert!(JobState::Assigned.can_transition_to(JobState::Queued));
        assert!(JobState::Running.can_transition_to(JobState::Queued));
    }
}
