// [apps/worker/src/engine.rs]
/*!
 * El lazo de sesion del worker: un unico `WorkerUplink`, un unico
 * temporizador de latido y un unico canal de resultados desde el
 * pool de ejecucion. Un job en vuelo a la vez, de modo que jamas hay
 * mas de una tarea bloqueante corriendo `docker run` por proceso.
 *
 * Si la conexion cae por cualquier motivo, el lazo exterior en `run`
 * reabre el uplink con el mismo `worker_id`, para que el coordinador
 * pueda reconciliar en lugar de tratarlo como un worker nuevo.
 */

use crate::config::WorkerArgs;
use crate::executor;
use gridx_domain_models::protocol::SessionMessage;
use gridx_domain_models::worker::WorkerStatus;
use gridx_infra_worker_transport::{ClientError, WorkerUplink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL_SECONDS: u64 = 15;
const RECONNECT_BACKOFF_SECONDS: u64 = 5;

pub struct WorkerEngine {
    args: WorkerArgs,
    worker_id: Uuid,
    shutdown: Arc<AtomicBool>,
}

impl WorkerEngine {
    pub fn new(args: WorkerArgs, shutdown: Arc<AtomicBool>) -> Self {
        let worker_id = args.worker_id_or_generated();
        Self { args, worker_id, shutdown }
    }

    /// Mantiene la sesion viva, reconectando con la misma identidad
    /// mientras el proceso no haya recibido una senal de apagado.
    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn run(&self) -> anyhow::Result<()> {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.run_session().await {
                Ok(()) => info!("🔌 [ENGINE]: Session closed cleanly."),
                Err(e) => {
                    if let Some(ClientError::Unauthorized(reason)) = e.downcast_ref::<ClientError>() {
                        error!("🚫 [ENGINE]: Coordinator rejected our credentials: {}", reason);
                        return Err(e);
                    }
                    warn!("⚠️ [ENGINE]: Session dropped: {}. Reconnecting in {}s.", e, RECONNECT_BACKOFF_SECONDS);
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_secs(RECONNECT_BACKOFF_SECONDS)).await;
        }
        Ok(())
    }

    async fn run_session(&self) -> anyhow::Result<()> {
        let mut uplink = WorkerUplink::connect(
            &self.args.stream_url(),
            self.worker_id,
            &self.args.user,
            &self.args.password,
            self.args.capabilities(),
        )
        .await?;

        info!("🪪 [ENGINE]: Registered as worker [{}] owned by [{}]", self.worker_id, self.args.user);

        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<executor::ExecutionOutcome>();
        let mut heartbeat = interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS));
        let mut busy = false;
        let max_output_bytes = self.args.max_output_bytes;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }

            tokio::select! {
                _ = heartbeat.tick() => {
                    let status = if busy { WorkerStatus::Busy } else { WorkerStatus::Idle };
                    uplink.send(&SessionMessage::Heartbeat { worker_id: self.worker_id, status }).await?;
                }

                incoming = uplink.recv() => {
                    match incoming? {
                        Some(SessionMessage::Assign { job_id, language, code, limits }) => {
                            if busy || self.shutdown.load(Ordering::SeqCst) {
                                let reason = if busy { "already running a job" } else { "shutting down" };
                                uplink.send(&SessionMessage::Ack { job_id, accepted: false, reason: Some(reason.to_string()) }).await?;
                            } else {
                                uplink.send(&SessionMessage::Ack { job_id, accepted: true, reason: None }).await?;
                                busy = true;
                                let sender = result_tx.clone();
                                tokio::task::spawn_blocking(move || {
                                    let outcome = executor::run(job_id, &language, &code, &limits, max_output_bytes);
                                    let _ = sender.send(outcome);
                                });
                            }
                        }
                        Some(SessionMessage::Cancel { job_id, reason }) => {
                            warn!("🛑 [ENGINE]: Coordinator cancelled job [{}]: {}", job_id, reason);
                        }
                        Some(other) => {
                            warn!("⚠️ [ENGINE]: Unexpected frame from coordinator (job {:?}).", other.job_id());
                        }
                        None => anyhow::bail!("coordinator closed the session"),
                    }
                }

                Some(outcome) = result_rx.recv() => {
                    busy = false;
                    let message = SessionMessage::JobResult {
                        job_id: outcome.job_id,
                        exit_code: outcome.exit_code,
                        stdout: outcome.stdout,
                        stderr: outcome.stderr,
                    };
                    uplink.send(&message).await?;
                }
            }
        }
    }
}
