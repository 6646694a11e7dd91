// [apps/worker/src/main.rs]
/*!
 * Punto de entrada del proceso trabajador: parsea la linea de comandos,
 * arma la senal de apagado ordenado y entrega el control al
 * `WorkerEngine`. Codigo de salida 0 en apagado limpio, distinto de
 * cero si la sesion nunca pudo autenticarse.
 */

use clap::Parser;
use gridx_worker_lib::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    gridx_shared_telemetry::init_tracing("gridx_worker");

    let args = WorkerArgs::parse();

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ [SHELL]: Shutdown requested; finishing the in-flight job before exiting.");
            signal_flag.store(true, Ordering::SeqCst);
        }
    });

    info!("🚀 [SHELL]: Handing control to the worker engine.");
    let engine = WorkerEngine::new(args, shutdown);

    match engine.run().await {
        Ok(()) => {
            info!("🏁 [SHELL]: Shutdown sequence concluded.");
            std::process::exit(0);
        }
        Err(e) => {
            error!("💀 [SHELL]: Worker engine collapsed: {}", e);
            std::process::exit(1);
        }
    }
}
