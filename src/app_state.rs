use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::engine::ValidationEngine;
use crate::services::queue::JobQueue;
use crate::services::store::JobStore;

/// Shared application state passed to all route handlers and workers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub store: Arc<JobStore>,
    pub engine: Arc<dyn ValidationEngine>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        queue: JobQueue,
        store: JobStore,
        engine: Arc<dyn ValidationEngine>,
        config: AppConfig,
    ) -> Self {
        Self {
            queue: Arc::new(queue),
            store: Arc::new(store),
            engine,
            config: Arc::new(config),
        }
    }
}
