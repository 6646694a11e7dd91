// [apps/coordinator/src/daemons/timeout_reaper.rs]
/*!
 * Reaper de limite de pared (C4): cada job `running` lleva su
 * propio `wall_timeout_seconds`; este daemon lo hace cumplir en vez de
 * depender del worker para autoabortar. Al vencerse, se falla el job
 * terminalmente y se pide al worker cancelar la ejecucion en curso.
 */

use crate::state::AppState;
use gridx_domain_models::protocol::SessionMessage;
use gridx_domain_models::worker::WorkerStatus;
use std::time::Duration;
use tokio::time::interval;
use tracing::{instrument, warn};

const TIMEOUT_SWEEP_INTERVAL_SECONDS: u64 = 10;

#[instrument(skip(state))]
pub async fn spawn(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(TIMEOUT_SWEEP_INTERVAL_SECONDS));

        loop {
            ticker.tick().await;

            let timed_out = match state.jobs.find_timed_out().await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("⚠️ [TIMEOUT_REAPER]: Could not query timed-out jobs: {}", e);
                    continue;
                }
            };

            for job_id in timed_out {
                reap(&state, job_id).await;
            }
        }
    });
}

async fn reap(state: &AppState, job_id: uuid::Uuid) {
    let job = match state.jobs.get(job_id).await {
        Ok(job) => job,
        Err(e) => {
            warn!("⚠️ [TIMEOUT_REAPER]: Lost job [{}] vanished before it could be reaped: {}", job_id, e);
            return;
        }
    };

    match state.jobs.fail(job_id, "wall_timeout_exceeded").await {
        Ok(()) => warn!("⏰ [TIMEOUT_REAPER]: Job [{}] exceeded its {}s wall budget.", job_id, job.limits.wall_timeout_seconds),
        Err(gridx_infra_db::DbError::InvalidStateTransition { .. }) => {
            warn!("🙈 [TIMEOUT_REAPER]: Job [{}] already reached a terminal state; timeout fail discarded.", job_id);
            return;
        }
        Err(e) => {
            warn!("⚠️ [TIMEOUT_REAPER]: Failed to fail timed-out job [{}]: {}", job_id, e);
            return;
        }
    }

    if let Some(worker_id) = job.assigned_worker {
        state.registry.send_to(worker_id, SessionMessage::Cancel { job_id, reason: "wall_timeout_exceeded".to_string() });
        state.registry.mark_idle(worker_id);
        if let Err(e) = state.workers.set_status(worker_id, WorkerStatus::Idle, None).await {
            warn!("⚠️ [TIMEOUT_REAPER]: Failed to persist idle status for [{}]: {}", worker_id, e);
        }
    }

    state.scheduler.wake();
}
