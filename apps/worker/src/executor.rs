// [apps/worker/src/executor.rs]
/*!
 * Executor (C7): ejecuta el codigo de un job dentro de un contenedor
 * Docker descartable, aislado de red y con privilegios minimos. Shell
 * a la CLI de `docker` via `std::process::Command` en vez de un SDK:
 * ningun crate de cliente Docker aparece en la pila del resto del
 * repositorio, y la forma "proceso hijo + hilos que drenan sus pipes +
 * sondeo de limite de pared" es la misma que el motor de mineria usa
 * para sus tareas bloqueantes (`tokio::task::spawn_blocking`).
 *
 * Garantiza exactamente un resultado por invocacion: cualquier fallo
 * de lanzamiento, de E/S o de limite de pared se traduce en un codigo
 * de salida sintetico no-cero con el motivo en `stderr`, nunca en un
 * panico ni en la ausencia de reporte.
 */

use gridx_domain_models::job::ExecutionLimits;
use std::io::Read;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{instrument, warn};
use uuid::Uuid;

const PYTHON_IMAGE: &str = "python:3.12-slim";
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct ExecutionOutcome {
    pub job_id: Uuid,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
enum ExecutorFault {
    #[error("unsupported_language: {0}")]
    UnsupportedLanguage(String),
    #[error("workspace_fault: {0}")]
    Workspace(#[from] std::io::Error),
    #[error("launch_fault: {0}")]
    Launch(std::io::Error),
    #[error("wait_fault: {0}")]
    Wait(std::io::Error),
    #[error("wall_timeout_exceeded")]
    Timeout,
}

/// Corre `code` dentro de un contenedor sandboxed y siempre devuelve
/// un resultado, nunca propaga un error al llamador.
#[instrument(skip(code), fields(job_id = %job_id, language = %language))]
pub fn run(job_id: Uuid, language: &str, code: &str, limits: &ExecutionLimits, max_output_bytes: usize) -> ExecutionOutcome {
    match run_sandboxed(language, code, limits, max_output_bytes) {
        Ok((exit_code, stdout, stderr)) => ExecutionOutcome { job_id, exit_code, stdout, stderr },
        Err(fault) => {
            warn!("⚠️ [EXECUTOR]: Job [{}] could not be run: {}", job_id, fault);
            ExecutionOutcome { job_id, exit_code: 1, stdout: String::new(), stderr: fault.to_string() }
        }
    }
}

fn run_sandboxed(language: &str, code: &str, limits: &ExecutionLimits, max_output_bytes: usize) -> Result<(i32, String, String), ExecutorFault> {
    if language != "python" {
        return Err(ExecutorFault::UnsupportedLanguage(language.to_string()));
    }

    let workspace = tempfile::tempdir()?;
    let script_path = workspace.path().join("job.py");
    std::fs::write(&script_path, code)?;

    let mut command = std::process::Command::new("docker");
    command
        .arg("run")
        .arg("--rm")
        .arg("--network").arg("none")
        .arg("--read-only")
        .arg("--cap-drop").arg("ALL")
        .arg("--pids-limit").arg("128")
        .arg("--memory").arg(format!("{}m", limits.memory_mb))
        .arg("--cpus").arg(limits.cpu_cores.to_string())
        .arg("--volume").arg(format!("{}:/workspace:ro", workspace.path().display()))
        .arg("--workdir").arg("/workspace")
        .arg(PYTHON_IMAGE)
        .arg("python3").arg("/workspace/job.py")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(ExecutorFault::Launch)?;
    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");

    let stdout_drain = std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buffer);
        buffer
    });
    let stderr_drain = std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buffer);
        buffer
    });

    let deadline = Instant::now() + Duration::from_secs(limits.wall_timeout_seconds);
    let status = loop {
        if let Some(status) = child.try_wait().map_err(ExecutorFault::Wait)? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecutorFault::Timeout);
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout_bytes = stdout_drain.join().unwrap_or_default();
    let stderr_bytes = stderr_drain.join().unwrap_or_default();

    Ok((status.code().unwrap_or(-1), truncate(stdout_bytes, max_output_bytes), truncate(stderr_bytes, max_output_bytes)))
}

fn truncate(bytes: Vec<u8>, max_bytes: usize) -> String {
    if bytes.len() <= max_bytes {
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    let mut text = String::from_utf8_lossy(&bytes[..max_bytes]).into_owned();
    text.push_str("...[truncated]");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_is_reported_without_touching_docker() {
        let limits = ExecutionLimits::default();
        let outcome = run(Uuid::new_v4(), "rust", "fn main() {}", &limits, 1024);
        assert_ne!(outcome.exit_code, 0);
        assert!(outcome.stderr.contains("unsupported_language"));
    }

    #[test]
    fn truncate_passes_short_output_through_unchanged() {
        assert_eq!(truncate(b"hi".to_vec(), 16), "hi");
    }

    #[test]
    fn truncate_caps_oversized_output() {
        let huge = vec![b'a'; 200];
        let truncated = truncate(huge, 10);
        assert!(truncated.ends_with("...[truncated]"));
    }
}
