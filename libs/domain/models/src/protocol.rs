// [libs/domain/models/src/protocol.rs]
//! El protocolo de sesion worker<->coordinador: un unico enum con
//! etiqueta `type`, serializado sobre el websocket persistente que abre
//! cada worker. Ambos lados comparten esta definicion para no divergir
//! en la forma del mensaje.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::ExecutionLimits;
use crate::worker::{WorkerCapabilities, WorkerStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMessage {
    /// Primer mensaje enviado por el worker al abrir la conexion.
    Auth {
        worker_id: Uuid,
        owner: String,
        secret: String,
        capabilities: WorkerCapabilities,
    },

    /// Respuesta del coordinador a un `auth` aceptado.
    AuthOk { worker_id: Uuid },

    /// Respuesta del coordinador a un `auth` rechazado; la conexion se
    /// cierra inmediatamente despues de enviar este mensaje.
    AuthFail { reason: String },

    /// Latido periodico emitido por el worker mientras la sesion vive,
    /// con una instantanea de su propio estado.
    Heartbeat { worker_id: Uuid, status: WorkerStatus },

    /// El coordinador entrega un job al worker que acaba de aceptar.
    Assign {
        job_id: Uuid,
        language: String,
        code: String,
        limits: ExecutionLimits,
    },

    /// El worker confirma (o rechaza) la asignacion recibida.
    Ack {
        job_id: Uuid,
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        reason: Option<String>,
    },

    /// Reporte intermedio opcional mientras el job corre.
    Progress { job_id: Uuid, message: String },

    /// Resultado final de la ejecucion. Renombrado a `result` en el
    /// cable para no colisionar con el vocabulario del lector humano.
    #[serde(rename = "result")]
    JobResult {
        job_id: Uuid,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// El coordinador pide al worker abortar un job en curso.
    Cancel { job_id: Uuid, reason: String },

    Ping,
    Pong,
}

impl SessionMessage {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            SessionMessage::Assign { job_id, .. }
            | SessionMessage::Ack { job_id, .. }
            | SessionMessage::Progress { job_id, .. }
            | SessionMessage::JobResult { job_id, .. }
            | SessionMessage::Cancel { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_result_serializes_with_result_tag() {
        let msg = SessionMessage::JobResult {
            job_id: Uuid::nil(),
            exit_code: 0,
            stdout: "ok".to_string(),
            stderr: String::new(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "result");
    }

    #[test]
    fn round_trips_through_json() {
        let msg = SessionMessage::Ack { job_id: Uuid::nil(), accepted: true, reason: None };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: SessionMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.job_id(), Some(Uuid::nil()));
    }

    #[test]
    fn ping_and_pong_carry_no_fields() {
        let encoded = serde_json::to_string(&SessionMessage::Ping).unwrap();
        assert_eq!(encoded, r#"{"type":"ping"}"#);
    }
}
