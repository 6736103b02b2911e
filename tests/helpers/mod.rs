//! Shared setup for the Redis-backed integration tests.

use std::path::Path;
use std::sync::Arc;

use phone_validator_api::app_state::AppState;
use phone_validator_api::config::AppConfig;
use phone_validator_api::services::engine::ValidationEngine;
use phone_validator_api::services::queue::JobQueue;
use phone_validator_api::services::store::JobStore;

/// Redis endpoint for the ignored integration tests.
pub fn test_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Config with short budgets suitable for test runs. The engine
/// command is unused when the state carries a scripted engine.
pub fn test_config(redis_url: &str, spool_dir: &Path) -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        redis_url: redis_url.to_string(),
        engine_command: "true".to_string(),
        spool_dir: spool_dir.to_path_buf(),
        queue_enabled: true,
        job_timeout_secs: 30,
        sync_timeout_secs: 10,
        manual_timeout_secs: 5,
        lease_grace_secs: 5,
        result_retention_secs: 120,
    }
}

/// Full application state against the test Redis.
pub fn test_state(spool_dir: &Path, engine: Arc<dyn ValidationEngine>) -> AppState {
    let redis_url = test_redis_url();
    let config = test_config(&redis_url, spool_dir);
    let queue = JobQueue::new(&redis_url).expect("queue");
    let store = JobStore::new(&redis_url, config.result_retention()).expect("store");
    AppState::new(queue, store, engine, config)
}
