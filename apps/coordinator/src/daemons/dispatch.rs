// [apps/coordinator/src/daemons/dispatch.rs]
/*!
 * Consumidor unico de la senal de despacho (C4): toda fuente que
 * pueda haber hecho aparecer un emparejamiento nuevo (sumision,
 * resultado, perdida de worker, reconexion) solo llama a
 * `Scheduler::wake`; este es el unico lazo que efectivamente corre
 * `dispatch_pass`.
 */

use crate::state::AppState;
use tracing::{info, instrument};

#[instrument(skip(state))]
pub async fn spawn(state: AppState) {
    tokio::spawn(async move {
        info!("📡 [DISPATCH_LOOP]: Dispatch consumer online.");
        loop {
            state.scheduler.wait_for_signal().await;
            state.scheduler.dispatch_pass(&state.jobs, &state.registry).await;
        }
    });
}
