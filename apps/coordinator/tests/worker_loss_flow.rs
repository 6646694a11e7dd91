// [apps/coordinator/tests/worker_loss_flow.rs]
//! Pruebas de integracion de la recuperacion ante perdida de worker:
//! un job asignado vuelve a la cola mientras le queden reintentos, y
//! falla de forma terminal sin reembolso al agotarlos.

use chrono::Utc;
use gridx_coordinator::config::Config;
use gridx_coordinator::scheduler::Scheduler;
use gridx_domain_models::job::{ExecutionLimits, Job, JobState};
use gridx_infra_db::{GridDbClient, JobRepository};
use uuid::Uuid;

fn sample_job() -> Job {
    Job {
        id: Uuid::new_v4(),
        submitter: "alice".to_string(),
        language: "python".to_string(),
        code: "print(1)".to_string(),
        limits: ExecutionLimits::default(),
        state: JobState::Queued,
        assigned_worker: None,
        stdout: None,
        stderr: None,
        exit_code: None,
        created_at: Utc::now(),
        completed_at: None,
    }
}

fn test_config(requeue_attempts: u32) -> Config {
    Config {
        http_port: 0,
        stream_port: 0,
        database_url: String::new(),
        database_token: None,
        starting_balance: gridx_domain_ledger::Amount::from_decimal(10.0),
        job_cost: gridx_domain_ledger::Amount::from_decimal(1.0),
        worker_reward: gridx_domain_ledger::Amount::from_decimal(0.8),
        heartbeat_interval: std::time::Duration::from_secs(15),
        stale_threshold: std::time::Duration::from_secs(90),
        offline_eviction_threshold: std::time::Duration::from_secs(86400),
        default_timeout: std::time::Duration::from_secs(300),
        max_code_length: 1024 * 1024,
        max_output_bytes: 64 * 1024,
        requeue_attempts,
        dispatch_skip_attempts: 5,
    }
}

#[tokio::test]
async fn a_lost_worker_sends_its_job_back_to_the_queue_while_attempts_remain() {
    let db = GridDbClient::connect("file:worker_loss_requeue?mode=memory&cache=shared", None).await.unwrap();
    let jobs = JobRepository::new(db);
    let config = test_config(3);
    let scheduler = Scheduler::new(config.dispatch_skip_attempts);

    let job = sample_job();
    jobs.create(&job).await.unwrap();
    jobs.assign_to_worker(job.id, Uuid::new_v4()).await.unwrap();

    scheduler.handle_worker_loss(&jobs, &config, job.id).await;

    let reloaded = jobs.get(job.id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Queued);
    assert_eq!(scheduler.queue_depth(), 1);
}

#[tokio::test]
async fn a_job_fails_terminally_once_its_requeue_budget_is_exhausted() {
    let db = GridDbClient::connect("file:worker_loss_exhausted?mode=memory&cache=shared", None).await.unwrap();
    let jobs = JobRepository::new(db);
    let config = test_config(1);
    let scheduler = Scheduler::new(config.dispatch_skip_attempts);

    let job = sample_job();
    jobs.create(&job).await.unwrap();
    // Una unica asignacion ya deja `dispatch_attempts` en 1, el tope
    // configurado: la perdida siguiente debe fallar, no reencolar.
    jobs.assign_to_worker(job.id, Uuid::new_v4()).await.unwrap();

    scheduler.handle_worker_loss(&jobs, &config, job.id).await;

    let reloaded = jobs.get(job.id).await.unwrap();
    assert_eq!(reloaded.state, JobState::Failed);
    assert_eq!(scheduler.queue_depth(), 0);
}
