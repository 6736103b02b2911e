use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::app_state::AppState;
use crate::models::api::JobStatusResponse;
use crate::models::job::JobState;
use crate::services::queue::QueueDepth;

/// GET /job-status/{job_id} — poll a job.
///
/// Queue position is attached only while the job is still queued. An
/// id that expired out of retention reads the same as one that never
/// existed: 404.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state
        .store
        .get(job_id)
        .await?
        .ok_or(ApiError::JobNotFound(job_id))?;

    let position = if job.state == JobState::Queued {
        match state.queue.position(job_id).await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Could not read queue position");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(JobStatusResponse::from_job(job, position)))
}

/// GET /stats — job counts per lifecycle bucket.
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<QueueDepth>> {
    let depth = state.queue.depth().await?;
    metrics::gauge!("validation_queue_depth").set(depth.queued as f64);
    Ok(Json(depth))
}
