// [libs/infra/worker-transport/src/errors.rs]
//! Catalogo de fallos del uplink websocket del worker.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("handshake_failed: {0}")]
    HandshakeFailed(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("encoding_fault: {0}")]
    EncodingFault(#[from] serde_json::Error),

    #[error("connection_closed")]
    ConnectionClosed,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unexpected_frame: expected a text frame, got something else")]
    UnexpectedFrame,
}
