// [apps/coordinator/src/config.rs]
//! Centraliza las variables de entorno del coordinador en un unico lugar
//! en vez de dispersar `std::env::var` por `kernel.rs` y los handlers: con
//! esta cantidad de perillas, vale la pena endurecerlo.

use gridx_domain_ledger::Amount;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub stream_port: u16,
    pub database_url: String,
    pub database_token: Option<String>,
    pub starting_balance: Amount,
    pub job_cost: Amount,
    pub worker_reward: Amount,
    pub heartbeat_interval: Duration,
    pub stale_threshold: Duration,
    pub offline_eviction_threshold: Duration,
    pub default_timeout: Duration,
    pub max_code_length: usize,
    pub max_output_bytes: usize,
    pub requeue_attempts: u32,
    pub dispatch_skip_attempts: u32,
}

impl Config {
    /// Lee la configuracion del entorno de proceso, aplicando valores por
    /// defecto razonables a cualquier variable ausente o invalida.
    pub fn from_env() -> Self {
        Self {
            http_port: env_parse("GRIDX_HTTP_PORT", 8081),
            stream_port: env_parse("GRIDX_STREAM_PORT", 8080),
            database_url: std::env::var("GRIDX_DATABASE_URL").unwrap_or_else(|_| "file:gridx.db".to_string()),
            database_token: std::env::var("GRIDX_DATABASE_TOKEN").ok(),
            starting_balance: Amount::from_decimal(env_parse("GRIDX_STARTING_BALANCE", 100.0)),
            job_cost: Amount::from_decimal(env_parse("GRIDX_JOB_COST", 1.0)),
            worker_reward: Amount::from_decimal(env_parse("GRIDX_WORKER_REWARD", 0.8)),
            heartbeat_interval: Duration::from_secs(env_parse("GRIDX_HEARTBEAT_INTERVAL_SECONDS", 15)),
            stale_threshold: Duration::from_secs(env_parse("GRIDX_STALE_THRESHOLD_SECONDS", 90)),
            offline_eviction_threshold: Duration::from_secs(env_parse("GRIDX_OFFLINE_EVICTION_SECONDS", 24 * 3600)),
            default_timeout: Duration::from_secs(env_parse("GRIDX_DEFAULT_TIMEOUT_SECONDS", 300)),
            max_code_length: env_parse("GRIDX_MAX_CODE_BYTES", 1024 * 1024),
            max_output_bytes: env_parse("GRIDX_MAX_OUTPUT_BYTES", 64 * 1024),
            requeue_attempts: env_parse("GRIDX_REQUEUE_ATTEMPTS", 3),
            dispatch_skip_attempts: env_parse("GRIDX_DISPATCH_SKIP_ATTEMPTS", 5),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}
