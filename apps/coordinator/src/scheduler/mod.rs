// [apps/coordinator/src/scheduler/mod.rs]
/*!
 * Scheduler (C4): la fila FIFO de jobs listos y el paso de despacho que los
 * empareja contra el Worker Registry. Un `tokio::sync::Notify` desacopla
 * quien pide un despacho (sumision nueva, worker que vuelve a `idle`,
 * resultado que llega, perdida de worker) de quien lo ejecuta: todas esas
 * fuentes solo notifican, y un unico consumidor drena la cola: una sola
 * cola productor-consumidor para las senales de despacho.
 */

use crate::config::Config;
use crate::state::registry::WorkerRegistry;
use gridx_domain_models::protocol::SessionMessage;
use gridx_infra_db::JobRepository;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct Scheduler {
    ready_queue: Mutex<VecDeque<Uuid>>,
    /// Conteo de intentos de `pick_idle` fallidos por job, para la
    /// decision de diseno de saltar la cabeza tras N intentos.
    skip_attempts: Mutex<HashMap<Uuid, u32>>,
    dispatch_signal: Notify,
    dispatch_skip_attempts: u32,
}

impl Scheduler {
    pub fn new(dispatch_skip_attempts: u32) -> Self {
        Self {
            ready_queue: Mutex::new(VecDeque::new()),
            skip_attempts: Mutex::new(HashMap::new()),
            dispatch_signal: Notify::new(),
            dispatch_skip_attempts,
        }
    }

    /// Reconstruye la fila en memoria al arrancar, en orden de creacion.
    pub fn hydrate(&self, queued_ids: Vec<Uuid>) {
        let mut queue = self.ready_queue.lock().expect("ready queue poisoned");
        queue.extend(queued_ids);
        if !queue.is_empty() {
            self.dispatch_signal.notify_one();
        }
    }

    pub fn enqueue(&self, job_id: Uuid) {
        self.ready_queue.lock().expect("ready queue poisoned").push_back(job_id);
        self.dispatch_signal.notify_one();
    }

    /// Reinserta un job al frente de la fila (perdida de worker, rechazo de
    /// `ack`): conserva su lugar relativo en vez de perderlo al final.
    pub fn requeue_front(&self, job_id: Uuid) {
        self.ready_queue.lock().expect("ready queue poisoned").push_front(job_id);
        self.dispatch_signal.notify_one();
    }

    pub fn wake(&self) {
        self.dispatch_signal.notify_one();
    }

    pub async fn wait_for_signal(&self) {
        self.dispatch_signal.notified().await;
    }

    pub fn queue_depth(&self) -> usize {
        self.ready_queue.lock().expect("ready queue poisoned").len()
    }

    /// Un pase de despacho: intenta emparejar la cabeza de la fila contra un
    /// worker idoneo, repitiendo hasta que la cabeza bloquee o la fila se
    /// vacie.
    #[instrument(skip(self, jobs, registry))]
    pub async fn dispatch_pass(&self, jobs: &JobRepository, registry: &WorkerRegistry) {
        loop {
            let head = { self.ready_queue.lock().expect("ready queue poisoned").front().copied() };
            let Some(job_id) = head else { break };

            let job = match jobs.get(job_id).await {
                Ok(job) => job,
                Err(e) => {
                    warn!("⚠️ [SCHEDULER]: Dropping unreadable head-of-queue job [{}]: {}", job_id, e);
                    self.ready_queue.lock().expect("ready queue poisoned").pop_front();
                    continue;
                }
            };

            let Some(worker_id) = registry.pick_idle(&job.limits.requirements()) else {
                if self.bump_skip_attempts(job_id) >= self.dispatch_skip_attempts {
                    self.rotate_head_behind_next();
                    continue;
                }
                break;
            };

            self.reset_skip_attempts(job_id);

            match jobs.assign_to_worker(job_id, worker_id).await {
                Ok(Some(assigned)) => {
                    registry.mark_busy(worker_id, job_id);
                    self.ready_queue.lock().expect("ready queue poisoned").pop_front();

                    registry.send_to(
                        worker_id,
                        SessionMessage::Assign {
                            job_id: assigned.id,
                            language: assigned.language,
                            code: assigned.code,
                            limits: assigned.limits,
                        },
                    );
                    info!("📬 [SCHEDULER]: Job [{}] dispatched to worker [{}].", job_id, worker_id);
                }
                Ok(None) => {
                    // Otro dispatcher ya lo tomo (o ya no esta en `queued`); retiralo de la fila local.
                    self.ready_queue.lock().expect("ready queue poisoned").pop_front();
                }
                Err(e) => {
                    warn!("⚠️ [SCHEDULER]: Failed to persist assignment of [{}]: {}", job_id, e);
                    break;
                }
            }
        }
    }

    /// Un worker se perdio (sesion caida, latido expirado) mientras
    /// sostenia `job_id`: reencola si aun quedan intentos, o lo falla
    /// de forma terminal si ya agoto el limite, sin reembolso automatico
    /// al agotar los reintentos.
    #[instrument(skip(self, jobs, config))]
    pub async fn handle_worker_loss(&self, jobs: &JobRepository, config: &Config, job_id: Uuid) {
        let attempts = match jobs.dispatch_attempts(job_id).await {
            Ok(attempts) => attempts,
            Err(e) => {
                warn!("⚠️ [SCHEDULER]: Could not read dispatch attempts for lost job [{}]: {}", job_id, e);
                return;
            }
        };

        if attempts >= config.requeue_attempts {
            if let Err(e) = jobs.fail(job_id, "worker_lost: requeue attempts exhausted").await {
                warn!("⚠️ [SCHEDULER]: Failed to mark exhausted job [{}] as failed: {}", job_id, e);
            } else {
                warn!("💀 [SCHEDULER]: Job [{}] failed terminally after {} dispatch attempts.", job_id, attempts);
            }
            return;
        }

        match jobs.requeue(job_id).await {
            Ok(()) => self.requeue_front(job_id),
            Err(e) => warn!("⚠️ [SCHEDULER]: Failed to requeue lost job [{}]: {}", job_id, e),
        }
    }

    fn bump_skip_attempts(&self, job_id: Uuid) -> u32 {
        let mut attempts = self.skip_attempts.lock().expect("skip attempts poisoned");
        let counter = attempts.entry(job_id).or_insert(0);
        *counter += 1;
        *counter
    }

    fn reset_skip_attempts(&self, job_id: Uuid) {
        self.skip_attempts.lock().expect("skip attempts poisoned").remove(&job_id);
    }

    /// Decision de diseno: en vez de
    /// bloquear la fila indefinidamente, el job sin worker idoneo cede su
    /// lugar al siguiente y se reintenta en el proximo pase.
    fn rotate_head_behind_next(&self) {
        let mut queue = self.ready_queue.lock().expect("ready queue poisoned");
        if queue.len() < 2 {
            return;
        }
        if let Some(head) = queue.pop_front() {
            queue.insert(1, head);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_and_requeue_front_order_correctly() {
        let scheduler = Scheduler::new(5);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        scheduler.enqueue(first);
        scheduler.enqueue(second);
        scheduler.requeue_front(second);

        let queue = scheduler.ready_queue.lock().unwrap();
        assert_eq!(queue.front().copied(), Some(second));
    }

    #[test]
    fn rotate_head_behind_next_swaps_blocked_head() {
        let scheduler = Scheduler::new(1);
        let blocked = Uuid::new_v4();
        let next = Uuid::new_v4();
        scheduler.enqueue(blocked);
        scheduler.enqueue(next);
        scheduler.rotate_head_behind_next();

        let queue: Vec<_> = scheduler.ready_queue.lock().unwrap().iter().copied().collect();
        assert_eq!(queue, vec![next, blocked]);
    }
}
