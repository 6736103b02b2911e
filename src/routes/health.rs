use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub queue: ComponentHealth,
    pub engine: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// GET / — service identification and endpoint map.
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "name": "Phone Validator API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "validate_file": "POST /validate-phones",
            "validate_manual": "POST /validate-phones-manual",
            "validate_forceful": "POST /validate-phones-forceful",
            "job_status": "GET /job-status/{job_id}",
            "stats": "/stats",
            "metrics": "/metrics",
        }
    }))
}

/// GET /health — dependency status for the queue and the engine.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    // Check queue connectivity
    let queue_start = std::time::Instant::now();
    let queue_check = match state.queue.health_check().await {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(queue_start.elapsed().as_millis() as u64),
            detail: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Queue health check failed");
            ComponentHealth {
                status: "error".to_string(),
                latency_ms: None,
                detail: None,
            }
        }
    };

    // Engine availability is a static probe, no process is spawned
    let probe = state.engine.probe();
    let engine_check = ComponentHealth {
        status: if probe.available { "ok" } else { "error" }.to_string(),
        latency_ms: None,
        detail: Some(probe.detail),
    };

    let all_healthy = queue_check.status == "ok" && engine_check.status == "ok";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            queue: queue_check,
            engine: engine_check,
        },
    };

    (status_code, Json(response))
}
