use phone_validator_api::{
    app_state::AppState,
    config::AppConfig,
    services::{
        engine::{SubprocessEngine, ValidationEngine},
        queue::JobQueue,
        store::JobStore,
        worker,
    },
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

/// How long one claim call blocks waiting for work.
const CLAIM_BLOCK_SECS: u64 = 2;
/// Delay before retrying after a queue or store error.
const ERROR_BACKOFF_MS: u64 = 1000;
/// How often to sweep the processing list for abandoned jobs.
const REAP_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting phone validation worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize services
    tracing::info!("Connecting to Redis");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
    let store = JobStore::new(&config.redis_url, config.result_retention())
        .expect("Failed to initialize job store");

    let engine = SubprocessEngine::from_command(&config.engine_command)
        .expect("Failed to configure validation engine");
    let probe = engine.probe();
    if !probe.available {
        tracing::warn!(
            detail = %probe.detail,
            "Validation engine artifact not found; jobs will fail until it is built"
        );
    }

    let state = AppState::new(queue, store, Arc::new(engine), config);

    tracing::info!("Worker ready, starting job processing loop");

    // Recover anything a previous worker left behind before taking
    // new work, then sweep periodically.
    run_reap(&state).await;
    let mut last_reap = Instant::now();

    // Main processing loop
    loop {
        if last_reap.elapsed() >= Duration::from_secs(REAP_INTERVAL_SECS) {
            run_reap(&state).await;
            last_reap = Instant::now();
        }

        match worker::process_next_job(&state, Duration::from_secs(CLAIM_BLOCK_SECS)).await {
            Ok(true) => {
                // Job processed, check for the next one immediately
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                // The claim already blocked its full wait, no sleep needed
                tracing::trace!("No jobs available");
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

async fn run_reap(state: &AppState) {
    match worker::reap_abandoned(state).await {
        Ok(0) => {}
        Ok(n) => tracing::info!(requeued = n, "Recovered abandoned jobs"),
        Err(e) => tracing::error!(error = %e, "Abandoned-job sweep failed"),
    }
}
