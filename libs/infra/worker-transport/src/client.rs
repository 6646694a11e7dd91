// [libs/infra/worker-transport/src/client.rs]
/*!
 * Cliente websocket persistente que un proceso `gridx-worker` usa para
 * mantener abierta su sesion con el coordinador. La identidad
 * (`worker_id`) se conserva a traves de reconexiones: si la conexion
 * cae, el mismo `worker_id` se reusa al reabrir el socket, de modo
 * que el coordinador puede reconciliar el job que tenia asignado en
 * lugar de tratarlo como un worker nuevo.
 */

use crate::errors::ClientError;
use futures_util::{SinkExt, StreamExt};
use gridx_domain_models::protocol::SessionMessage;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, instrument, warn};
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WorkerUplink {
    socket: Socket,
}

impl WorkerUplink {
    /// Abre el socket y ejecuta el handshake `auth` / `auth_ok`.
    #[instrument(skip(secret, capabilities))]
    pub async fn connect(
        url: &str,
        worker_id: Uuid,
        owner: &str,
        secret: &str,
        capabilities: gridx_domain_models::worker::WorkerCapabilities,
    ) -> Result<Self, ClientError> {
        let (mut socket, _response) = connect_async(url).await?;
        info!("🔗 [UPLINK]: Websocket handshake complete with [{}]", url);

        let auth = SessionMessage::Auth {
            worker_id,
            owner: owner.to_string(),
            secret: secret.to_string(),
            capabilities,
        };
        let encoded = serde_json::to_string(&auth)?;
        socket.send(Message::Text(encoded)).await?;

        match socket.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<SessionMessage>(&text)? {
                SessionMessage::AuthOk { worker_id: confirmed } => {
                    info!("🪪 [UPLINK]: Authenticated as worker [{}]", confirmed);
                }
                SessionMessage::AuthFail { reason } => {
                    return Err(ClientError::Unauthorized(reason));
                }
                other => {
                    warn!("⚠️ [UPLINK]: Unexpected handshake reply: {:?}", other);
                    return Err(ClientError::UnexpectedFrame);
                }
            },
            Some(Ok(_)) => return Err(ClientError::UnexpectedFrame),
            Some(Err(e)) => return Err(ClientError::HandshakeFailed(e)),
            None => return Err(ClientError::ConnectionClosed),
        }

        Ok(Self { socket })
    }

    pub async fn send(&mut self, message: &SessionMessage) -> Result<(), ClientError> {
        let encoded = serde_json::to_string(message)?;
        self.socket.send(Message::Text(encoded)).await?;
        Ok(())
    }

    /// Devuelve `None` cuando el socket se cierra limpiamente; un
    /// frame no-texto se ignora en lugar de tumbar la sesion.
    pub async fn recv(&mut self) -> Result<Option<SessionMessage>, ClientError> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::HandshakeFailed(e)),
            }
        }
    }
}
