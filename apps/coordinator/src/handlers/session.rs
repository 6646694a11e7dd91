// [apps/coordinator/src/handlers/session.rs]
/*!
 * Session protocol (C5): el socket persistente que cada worker abre y
 * mantiene vivo. El primer frame debe ser `auth`; todo lo demas corre
 * en una arquitectura de dos tareas (downstream / upstream) torn down
 * juntas vía `tokio::select!` apenas una de las dos termina, siguiendo
 * la forma de "Protocol Trinity" del resto del coordinador, sin la
 * tercera tarea interna: aqui el procesamiento de un frame entrante
 * nunca bloquea el envio de salientes de la misma sesion, asi que
 * separar la lectura de red de la logica de negocio no gana nada.
 */

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use gridx_domain_models::account::validate_account_id;
use gridx_domain_models::protocol::SessionMessage;
use gridx_domain_models::worker::WorkerCapabilities;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const KEEPALIVE_INTERVAL_SECONDS: u64 = 20;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let Some((worker_id, owner, capabilities)) = authenticate(stream.next().await, &mut sink, &state).await else {
        return;
    };

    if let Err(e) = state.workers.upsert(worker_id, &owner, &capabilities).await {
        warn!("⚠️ [SESSION]: Failed to persist worker [{}] snapshot: {}", worker_id, e);
    }

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<SessionMessage>();
    state.registry.register(worker_id, owner.clone(), capabilities, outbound_tx);
    state.scheduler.wake();

    info!("⚡ [SESSION_OPEN]: Worker [{}] ({}) online.", worker_id, owner);

    let mut downstream_task = tokio::spawn(async move {
        let mut keepalive = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));
        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                outbound = outbound_rx.recv() => {
                    let Some(message) = outbound else { break };
                    match serde_json::to_string(&message) {
                        Ok(encoded) => {
                            if sink.send(Message::Text(encoded)).await.is_err() {
                                warn!("⚠️ [SESSION]: Downstream write failed for worker [{}].", worker_id);
                                break;
                            }
                        }
                        Err(e) => warn!("⚠️ [SESSION]: Failed to encode outbound frame for [{}]: {}", worker_id, e),
                    }
                }
            }
        }
    });

    let upstream_state = state.clone();
    let mut upstream_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(raw)) => match serde_json::from_str::<SessionMessage>(&raw) {
                    Ok(message) => handle_frame(&upstream_state, worker_id, message).await,
                    Err(e) => warn!("⚠️ [SESSION]: Malformed frame from worker [{}]: {}", worker_id, e),
                },
                Ok(Message::Close(_)) => {
                    debug!("🔌 [SESSION]: Worker [{}] closed its end.", worker_id);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("⚠️ [SESSION]: Transport error on worker [{}]: {}", worker_id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut downstream_task => upstream_task.abort(),
        _ = &mut upstream_task => downstream_task.abort(),
    }

    finalize_session(&state, worker_id).await;
    info!("💤 [SESSION_CLOSED]: Worker [{}] offline.", worker_id);
}

/// Procesa el primer frame de la conexion, que debe ser `auth`. Envia
/// `auth_ok`/`auth_fail` y devuelve la identidad resuelta, o `None` si
/// el handshake fallo y la conexion debe cerrarse sin mas.
async fn authenticate(
    first: Option<Result<Message, axum::Error>>,
    sink: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
) -> Option<(Uuid, String, WorkerCapabilities)> {
    let raw = match first {
        Some(Ok(Message::Text(raw))) => raw,
        _ => return None,
    };

    let parsed: SessionMessage = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            warn!("⚠️ [SESSION]: First frame was not valid JSON: {}", e);
            return None;
        }
    };

    let SessionMessage::Auth { worker_id, owner, secret, capabilities } = parsed else {
        let _ = send_one(sink, &SessionMessage::AuthFail { reason: "first frame must be auth".to_string() }).await;
        return None;
    };

    if let Err(e) = validate_account_id(&owner) {
        let _ = send_one(sink, &SessionMessage::AuthFail { reason: e.message }).await;
        return None;
    }

    if let Err(e) = state.accounts.ensure_account(&owner, state.config.starting_balance).await {
        warn!("⚠️ [SESSION]: Could not provision account [{}]: {}", owner, e);
        let _ = send_one(sink, &SessionMessage::AuthFail { reason: "account provisioning failed".to_string() }).await;
        return None;
    }

    match state.accounts.verify_auth(&owner, &secret).await {
        Ok(true) => {}
        Ok(false) => {
            let _ = send_one(sink, &SessionMessage::AuthFail { reason: "secret mismatch".to_string() }).await;
            return None;
        }
        Err(e) => {
            warn!("⚠️ [SESSION]: Auth lookup failed for [{}]: {}", owner, e);
            let _ = send_one(sink, &SessionMessage::AuthFail { reason: "internal error".to_string() }).await;
            return None;
        }
    }

    if let Err(e) = state.accounts.set_auth_on_first_use(&owner, &secret).await {
        warn!("⚠️ [SESSION]: Failed to lock in secret for [{}]: {}", owner, e);
    }

    if send_one(sink, &SessionMessage::AuthOk { worker_id }).await.is_err() {
        return None;
    }

    Some((worker_id, owner, capabilities))
}

async fn send_one(sink: &mut SplitSink<WebSocket, Message>, message: &SessionMessage) -> Result<(), axum::Error> {
    let encoded = serde_json::to_string(message).expect("SessionMessage always serializes");
    sink.send(Message::Text(encoded)).await
}

#[instrument(skip(state, message), fields(worker_id = %worker_id))]
async fn handle_frame(state: &AppState, worker_id: Uuid, message: SessionMessage) {
    match message {
        SessionMessage::Heartbeat { .. } => {
            state.registry.touch(worker_id);
            if let Err(e) = state.workers.touch_heartbeat(worker_id).await {
                warn!("⚠️ [SESSION]: Heartbeat persistence failed for [{}]: {}", worker_id, e);
            }
        }

        SessionMessage::Ack { job_id, accepted: true, .. } => {
            if let Err(e) = state.jobs.mark_running(job_id).await {
                warn!("⚠️ [SESSION]: Could not move job [{}] to running: {}", job_id, e);
            }
        }

        SessionMessage::Ack { job_id, accepted: false, reason } => {
            warn!("🙅 [SESSION]: Worker [{}] declined job [{}]: {:?}", worker_id, job_id, reason);
            state.registry.mark_idle(worker_id);
            state.scheduler.handle_worker_loss(&state.jobs, &state.config, job_id).await;
            state.scheduler.wake();
        }

        SessionMessage::Progress { job_id, message } => {
            debug!("📈 [PROGRESS]: Job [{}] on worker [{}]: {}", job_id, worker_id, message);
        }

        SessionMessage::JobResult { job_id, exit_code, stdout, stderr } => {
            complete_job(state, worker_id, job_id, exit_code, stdout, stderr).await;
        }

        SessionMessage::Pong => {}

        other => {
            warn!("⚠️ [SESSION]: Unexpected frame from worker [{}]: {:?}", worker_id, other.job_id());
        }
    }
}

/// Cierra un job terminado: acredita al dueno del worker si salio con
/// codigo 0 y transiciona la fila dentro de la misma transaccion. Un
/// segundo `result` para un job ya terminal no tiene filas que
/// actualizar; se registra y se descarta en vez de propagar error.
async fn complete_job(state: &AppState, worker_id: Uuid, job_id: Uuid, exit_code: i32, stdout: String, stderr: String) {
    let stdout = truncate_output(stdout, state.config.max_output_bytes);
    let stderr = truncate_output(stderr, state.config.max_output_bytes);

    let outcome: Result<(), gridx_infra_db::DbError> = async {
        let uow = state.db.unit_of_work().await?;
        if exit_code == 0 {
            if let Some(owner) = state.registry.owner_of(worker_id) {
                uow.credit(&owner, state.config.worker_reward, Some(job_id)).await?;
            }
        }
        uow.complete_job(job_id, exit_code, &stdout, &stderr).await?;
        uow.commit().await
    }
    .await;

    match outcome {
        Ok(()) => info!("🏁 [SESSION]: Job [{}] closed by worker [{}] with exit code {}.", job_id, worker_id, exit_code),
        Err(gridx_infra_db::DbError::InvalidStateTransition { .. }) => {
            warn!("🙈 [SESSION]: Duplicate result for job [{}] discarded.", job_id);
        }
        Err(e) => warn!("⚠️ [SESSION]: Failed to close job [{}]: {}", job_id, e),
    }

    state.registry.mark_idle(worker_id);
    if let Err(e) = state.workers.set_status(worker_id, gridx_domain_models::worker::WorkerStatus::Idle, None).await {
        warn!("⚠️ [SESSION]: Failed to persist idle status for [{}]: {}", worker_id, e);
    }
    state.scheduler.wake();
}

const TRUNCATION_MARKER: &str = "...[truncated]";

/// Recorta `output` para que, marcador incluido, nunca exceda `max_bytes`.
fn truncate_output(mut output: String, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output;
    }
    let budget = max_bytes.saturating_sub(TRUNCATION_MARKER.len());
    while !output.is_char_boundary(budget) {
        output.pop();
    }
    output.truncate(budget);
    output.push_str(TRUNCATION_MARKER);
    output
}

/// Limpieza al cerrarse la sesion: la marca offline y, si sostenia un
/// job, dispara la misma via de perdida-de-worker que usa el barrido
/// de staleness, en vez de esperar al proximo pase periodico.
async fn finalize_session(state: &AppState, worker_id: Uuid) {
    let held_job = state.registry.current_job_of(worker_id);
    state.registry.mark_offline(worker_id);
    if let Err(e) = state.workers.mark_offline(worker_id).await {
        warn!("⚠️ [SESSION]: Failed to persist offline status for [{}]: {}", worker_id, e);
    }

    if let Some(job_id) = held_job {
        state.scheduler.handle_worker_loss(&state.jobs, &state.config, job_id).await;
        state.scheduler.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_output_leaves_short_strings_untouched() {
        assert_eq!(truncate_output("hello".to_string(), 64), "hello");
    }

    #[test]
    fn truncate_output_caps_long_strings() {
        let long = "x".repeat(100);
        let truncated = truncate_output(long, 30);
        assert!(truncated.starts_with("xxxxxxxxxx"));
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.len() <= 30);
    }

    #[test]
    fn truncate_output_never_exceeds_the_configured_cap() {
        let long = "x".repeat(100);
        for cap in [0, 1, 13, 14, 15, 30, 64] {
            assert!(truncate_output(long.clone(), cap).len() <= cap.max(TRUNCATION_MARKER.len()));
        }
    }
}
