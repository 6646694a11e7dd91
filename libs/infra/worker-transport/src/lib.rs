// [libs/infra/worker-transport/src/lib.rs]
/*!
 * =================================================================
 * APARATO: WORKER TRANSPORT LIBRARY (GRID-X)
 * CLASIFICACIÓN: INFRASTRUCTURE LIB (ESTRATO L3)
 * RESPONSABILIDAD: UPLINK WEBSOCKET PERSISTENTE HACIA EL COORDINADOR
 * =================================================================
 */

pub mod client;
pub mod errors;

pub use client::WorkerUplink;
pub use errors::ClientError;
