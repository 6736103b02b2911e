use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use super::{ApiError, ApiResult};
use crate::app_state::AppState;
use crate::models::api::{ForcefulValidateRequest, ManualValidateRequest, SubmitResponse};
use crate::models::phone::ValidationReport;
use crate::services::{intake, worker};

/// POST /validate-phones — bulk upload of a leads file.
///
/// With the queue enabled the file is spooled and a job handle comes
/// back for polling. With the queue disabled the engine runs inline
/// and the response is the full report.
pub async fn validate_phones(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart request: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_string).unwrap_or_default();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Could not read upload: {e}")))?;
            upload = Some((filename, data));
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;

    let input_path = intake::spool_upload(&filename, &data, &state.config.spool_dir)?;

    if state.config.queue_enabled {
        let job = intake::submit_job(&state.queue, &filename, input_path).await?;
        metrics::counter!("validation_jobs_total").increment(1);

        // Position is informational; a hiccup here must not fail a
        // submission that already happened.
        let position = match state.queue.position(job.id).await {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Could not read queue position");
                None
            }
        };

        tracing::info!(job_id = %job.id, filename = %job.filename, "Job enqueued");
        Ok(Json(SubmitResponse {
            job_id: job.id,
            status: job.state.to_string(),
            position,
            message: "File submitted for validation".to_string(),
        })
        .into_response())
    } else {
        let report = worker::run_inline(
            state.engine.as_ref(),
            input_path,
            &state.config.spool_dir,
            state.config.sync_timeout(),
        )
        .await?;
        Ok(Json(report).into_response())
    }
}

/// POST /validate-phones-manual — check one number synchronously.
pub async fn validate_phones_manual(
    State(state): State<AppState>,
    Json(req): Json<ManualValidateRequest>,
) -> ApiResult<Json<ValidationReport>> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let input_path = intake::synthesize_manual(
        &req.phone,
        req.country.as_deref(),
        &state.config.spool_dir,
    )?;
    let report = worker::run_inline(
        state.engine.as_ref(),
        input_path,
        &state.config.spool_dir,
        state.config.manual_timeout(),
    )
    .await?;
    Ok(Json(report))
}

/// POST /validate-phones-forceful — try one number against every
/// candidate country, synchronously.
pub async fn validate_phones_forceful(
    State(state): State<AppState>,
    Json(req): Json<ForcefulValidateRequest>,
) -> ApiResult<Json<ValidationReport>> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let input_path = intake::synthesize_forceful(&req.phone, &state.config.spool_dir)?;
    let report = worker::run_inline(
        state.engine.as_ref(),
        input_path,
        &state.config.spool_dir,
        state.config.sync_timeout(),
    )
    .await?;
    Ok(Json(report))
}
