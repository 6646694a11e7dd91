// [apps/worker/src/config.rs]
//! Directivas de arranque del proceso trabajador: un unico punto de
//! entrada que acepta `--user`, `--password`, `--coordinator-ip`,
//! `--http-port`, `--stream-port`.

use clap::Parser;
use gridx_domain_models::worker::WorkerCapabilities;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "gridx-worker",
    version,
    about = "Proceso trabajador de Grid-X: ejecuta codigo enviado dentro de un contenedor sandboxed."
)]
pub struct WorkerArgs {
    /// Cuenta duena del worker; se debita/acredita en ella.
    #[arg(long, env = "GRIDX_WORKER_USER")]
    pub user: String,

    /// Secreto compartido: "trust on first use" del lado del coordinador.
    #[arg(long, env = "GRIDX_WORKER_PASSWORD")]
    pub password: String,

    #[arg(long, env = "GRIDX_COORDINATOR_IP", default_value = "127.0.0.1")]
    pub coordinator_ip: String,

    /// Puerto de la API de sumision del coordinador (no usado por el
    /// worker directamente; aceptado para paridad con la superficie
    /// de linea de comandos documentada).
    #[arg(long, env = "GRIDX_COORDINATOR_HTTP_PORT", default_value_t = 8081)]
    pub http_port: u16,

    /// Puerto del socket de sesion de worker (C5): a este se conecta.
    #[arg(long, env = "GRIDX_COORDINATOR_STREAM_PORT", default_value_t = 8080)]
    pub stream_port: u16,

    /// Identidad estable a traves de reconexiones; si se omite, se
    /// genera una nueva en cada arranque.
    #[arg(long, env = "GRIDX_WORKER_ID")]
    pub worker_id: Option<Uuid>,

    #[arg(long, env = "GRIDX_WORKER_CPU_CORES")]
    pub cpu_cores: Option<u32>,

    #[arg(long, env = "GRIDX_WORKER_MEMORY_MB", default_value_t = 2048)]
    pub memory_mb: u64,

    #[arg(long, env = "GRIDX_WORKER_ACCELERATOR_COUNT", default_value_t = 0)]
    pub accelerator_count: u32,

    #[arg(long, env = "GRIDX_WORKER_MAX_OUTPUT_BYTES", default_value_t = 64 * 1024)]
    pub max_output_bytes: usize,
}

impl WorkerArgs {
    pub fn stream_url(&self) -> String {
        format!("ws://{}:{}/ws/worker", self.coordinator_ip, self.stream_port)
    }

    pub fn worker_id_or_generated(&self) -> Uuid {
        self.worker_id.unwrap_or_else(Uuid::new_v4)
    }

    pub fn capabilities(&self) -> WorkerCapabilities {
        WorkerCapabilities {
            cpu_cores: self.cpu_cores.unwrap_or_else(|| num_cpus::get() as u32),
            accelerator_count: self.accelerator_count,
            memory_mb: self.memory_mb,
        }
    }
}
