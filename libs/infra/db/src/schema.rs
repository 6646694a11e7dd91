// [libs/infra/db/src/schema.rs]
/*!
 * Definicion y sincronizacion del esquema SQL de Grid-X, en tres
 * estratos: tablas base, mutaciones evolutivas y endurecimiento de
 * indices. Cada estrato es idempotente: la migracion puede aplicarse
 * en caliente contra una base ya poblada sin romper datos existentes.
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/// Estrato 1: genesis de tablas. Cuentas, jobs, sesiones de worker y el
/// libro mayor de movimientos de credito.
const BASE_TABLES: &[(&str, &str)] = &[
    ("TABLE_ACCOUNTS", r#"
        CREATE TABLE IF NOT EXISTS accounts (
            account_id TEXT PRIMARY KEY,
            balance_micros INTEGER NOT NULL DEFAULT 0,
            secret_hash TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_JOBS", r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            submitter TEXT NOT NULL,
            language TEXT NOT NULL,
            code TEXT NOT NULL,
            wall_timeout_seconds INTEGER NOT NULL,
            memory_mb INTEGER NOT NULL,
            cpu_cores INTEGER NOT NULL DEFAULT 1,
            accelerator_required INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'queued',
            assigned_worker TEXT,
            stdout TEXT,
            stderr TEXT,
            exit_code INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            assigned_at DATETIME,
            completed_at DATETIME
        );
    "#),
    ("TABLE_WORKERS", r#"
        CREATE TABLE IF NOT EXISTS workers (
            worker_id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'idle',
            capabilities_json TEXT NOT NULL,
            current_job TEXT,
            last_heartbeat DATETIME DEFAULT CURRENT_TIMESTAMP,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_LEDGER_ENTRIES", r#"
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            job_id TEXT,
            amount_micros INTEGER NOT NULL,
            kind TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/// Estrato 2: mutaciones sobre tablas ya existentes. `ALTER TABLE`
/// fallidos por columna duplicada son absorbidos silenciosamente; es
/// la senal de que esta instancia ya paso por esta migracion antes.
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("JOB_DISPATCH_ATTEMPTS", "ALTER TABLE jobs ADD COLUMN dispatch_attempts INTEGER DEFAULT 0"),
    ("JOB_FAILURE_REASON", "ALTER TABLE jobs ADD COLUMN failure_reason TEXT"),
];

/// Estrato 3: indices de aceleracion para las consultas de despacho y
/// de barrido de latido (heartbeat sweep).
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_JOBS_STATE", "CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state, created_at);"),
    ("IDX_JOBS_SUBMITTER", "CREATE INDEX IF NOT EXISTS idx_jobs_submitter ON jobs(submitter);"),
    ("IDX_WORKERS_STATUS", "CREATE INDEX IF NOT EXISTS idx_workers_status ON workers(status, last_heartbeat);"),
    ("IDX_LEDGER_ACCOUNT", "CREATE INDEX IF NOT EXISTS idx_ledger_account ON ledger_entries(account_id, created_at);"),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA]: Synchronizing Grid-X schema...");

    solidify_base_tables(conn).await?;
    apply_evolutionary_strata(conn).await?;
    harden_indexes(conn).await?;

    info!("✅ [SCHEMA]: Grid-X schema is level.");
    Ok(())
}

async fn solidify_base_tables(conn: &Connection) -> Result<()> {
    for (identifier, sql) in BASE_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        conn.execute(*sql, ())
            .await
            .with_context(|| format!("failed to create table: {}", identifier))?;
    }
    Ok(())
}

async fn apply_evolutionary_strata(conn: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match conn.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [MIGRATE]: Applied {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [MIGRATE_SKIP]: {} already applied.", identifier);
                } else {
                    warn!("  ⚠️ [MIGRATE_BYPASS]: {} incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_indexes(conn: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        conn.execute(*sql, ())
            .await
            .with_context(|| format!("failed to create index: {}", identifier))?;
    }
    Ok(())
}
