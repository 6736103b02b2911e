mod app_state;
mod config;
mod models;
mod routes;
mod services;

use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::engine::{SubprocessEngine, ValidationEngine};
use services::queue::JobQueue;
use services::store::JobStore;

/// Largest accepted upload (50 MB).
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing phone-validator-api server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "validation_jobs_total",
        "Total validation jobs submitted"
    );
    metrics::describe_counter!(
        "validation_jobs_completed",
        "Total validation jobs that succeeded"
    );
    metrics::describe_counter!(
        "validation_jobs_failed",
        "Total validation jobs that failed"
    );
    metrics::describe_histogram!(
        "validation_processing_seconds",
        "Time to run one validation job"
    );
    metrics::describe_gauge!(
        "validation_queue_depth",
        "Current number of queued jobs"
    );

    // Connect the job queue and status store
    tracing::info!("Connecting to Redis");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
    let store = JobStore::new(&config.redis_url, config.result_retention())
        .expect("Failed to initialize job store");

    // Configure the validation engine
    let engine = SubprocessEngine::from_command(&config.engine_command)
        .expect("Failed to configure validation engine");
    let probe = engine.probe();
    if !probe.available {
        tracing::warn!(
            detail = %probe.detail,
            "Validation engine artifact not found; jobs will fail until it is built"
        );
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(queue, store, Arc::new(engine), config);

    // Build API routes
    let app = Router::new()
        .route("/", get(routes::health::service_info))
        .route("/health", get(routes::health::health_check))
        .route("/validate-phones", post(routes::validate::validate_phones))
        .route(
            "/validate-phones-manual",
            post(routes::validate::validate_phones_manual),
        )
        .route(
            "/validate-phones-forceful",
            post(routes::validate::validate_phones_forceful),
        )
        .route("/job-status/{job_id}", get(routes::status::job_status))
        .route("/stats", get(routes::status::stats))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES));

    tracing::info!("Starting phone-validator-api on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
