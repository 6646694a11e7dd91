// [libs/domain/models/src/error_kind.rs]
//! Taxonomia de errores compartida entre el coordinador y el trabajador.
//! `ErrorKind` es el vocabulario comun; cada capa de transporte (HTTP en
//! el coordinador, log local en el worker) decide como renderizarlo.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Unauthenticated,
    InsufficientCredits,
    NotFound,
    Conflict,
    WorkerLost,
    Timeout,
    ExecutionFailed,
    Internal,
}

#[derive(Error, Debug)]
#[error("{kind:?}: {message}")]
pub struct ModelError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}
