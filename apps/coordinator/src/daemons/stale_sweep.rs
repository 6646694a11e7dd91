// [apps/coordinator/src/daemons/stale_sweep.rs]
/*!
 * Barrido de liveness de workers (C2): marca offline a toda
 * sesion cuyo ultimo latido quedo por detras de `stale_threshold`,
 * reencola el job que sostenia, y luego evicta del registro en memoria
 * a las sesiones offline desde antes de `offline_eviction_threshold`.
 */

use crate::state::AppState;
use chrono::Utc;
use tokio::time::interval;
use tracing::{info, instrument, warn};

#[instrument(skip(state))]
pub async fn spawn(state: AppState) {
    tokio::spawn(async move {
        info!("🩺 [STALE_SWEEP]: Worker liveness daemon initiated.");
        let mut ticker = interval(state.config.heartbeat_interval);

        loop {
            ticker.tick().await;

            let stale_cutoff = Utc::now() - chrono_duration(state.config.stale_threshold);
            for (worker_id, held_job) in state.registry.find_stale(stale_cutoff) {
                warn!("📴 [STALE_SWEEP]: Worker [{}] missed its heartbeat window.", worker_id);
                state.registry.mark_offline(worker_id);
                if let Err(e) = state.workers.mark_offline(worker_id).await {
                    warn!("⚠️ [STALE_SWEEP]: Failed to persist offline status for [{}]: {}", worker_id, e);
                }
                if let Some(job_id) = held_job {
                    state.scheduler.handle_worker_loss(&state.jobs, &state.config, job_id).await;
                }
            }
            state.scheduler.wake();

            let evict_cutoff = Utc::now() - chrono_duration(state.config.offline_eviction_threshold);
            for worker_id in state.registry.find_evictable(evict_cutoff) {
                state.registry.deregister(worker_id);
                info!("🗑️ [STALE_SWEEP]: Worker [{}] evicted after a long offline spell.", worker_id);
            }
        }
    });
}

fn chrono_duration(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero())
}
