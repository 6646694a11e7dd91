// [apps/coordinator/src/kernel.rs]
/*!
 * Composition root del coordinador: abre la base de datos, arma el
 * `AppState`, rehidrata la fila de despacho y levanta los daemons de
 * fondo antes de aceptar la primera conexion HTTP.
 */

use crate::config::Config;
use crate::daemons;
use crate::routes::{build_session_router, build_submission_router};
use crate::state::AppState;
use gridx_infra_db::GridDbClient;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, instrument};

pub struct CoordinatorKernel {
    http_port: u16,
    stream_port: u16,
    state: AppState,
}

impl CoordinatorKernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: Config) -> Self {
        let db = GridDbClient::connect(&config.database_url, config.database_token.clone())
            .await
            .expect("FATAL: could not open the Grid-X database. Ignition aborted.");

        let http_port = config.http_port;
        let stream_port = config.stream_port;
        Self { http_port, stream_port, state: AppState::new(db, config) }
    }

    /// Rehidrata la cola FIFO en memoria, arranca los daemons de fondo
    /// y acepta conexiones en los dos puertos (REST y sesion de worker)
    /// hasta que el proceso termine.
    pub async fn launch(self) {
        match self.state.jobs.list_queued_ordered().await {
            Ok(queued) => {
                info!("🔁 [KERNEL]: Rehydrating {} queued job(s) from disk.", queued.len());
                self.state.scheduler.hydrate(queued);
            }
            Err(e) => error!("⚠️ [KERNEL]: Failed to rehydrate the dispatch queue: {}", e),
        }

        daemons::dispatch::spawn(self.state.clone()).await;
        daemons::stale_sweep::spawn(self.state.clone()).await;
        daemons::timeout_reaper::spawn(self.state.clone()).await;

        let submission_router = build_submission_router(self.state.clone());
        let session_router = build_session_router(self.state);

        let submission_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.http_port);
        let session_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.stream_port);

        let submission_listener = tokio::net::TcpListener::bind(submission_address)
            .await
            .expect("CRITICAL_FAULT: failed to bind the submission API port.");
        let session_listener = tokio::net::TcpListener::bind(session_address)
            .await
            .expect("CRITICAL_FAULT: failed to bind the worker session port.");

        info!("🚀 [KERNEL_ONLINE]: Submission API on {}, worker sessions on {}.", submission_address, session_address);

        let submission_server = axum::serve(submission_listener, submission_router);
        let session_server = axum::serve(session_listener, session_router);

        tokio::select! {
            result = submission_server => {
                if let Err(e) = result {
                    error!("💀 [KERNEL_COLLAPSE]: Submission API failure: {}", e);
                    std::process::exit(1);
                }
            }
            result = session_server => {
                if let Err(e) = result {
                    error!("💀 [KERNEL_COLLAPSE]: Worker session server failure: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
