use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use crate::services::intake::IntakeError;
use crate::services::queue::QueueError;
use crate::services::store::StoreError;
use crate::services::translator::ValidationError;

pub mod health;
pub mod metrics;
pub mod status;
pub mod validate;

/// Error type for HTTP handlers.
///
/// Serializes as `{"detail": ...}`, the shape this service's clients
/// already parse, with a machine-readable `kind` added when an inline
/// validation run fails.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, detail) = match &self {
            ApiError::Intake(IntakeError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, None, msg.clone())
            }
            ApiError::Intake(IntakeError::QueueUnavailable(e)) => {
                tracing::error!(error = %e, "Queue unavailable for submission");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    None,
                    "Validation queue is unavailable".to_string(),
                )
            }
            ApiError::Intake(IntakeError::Io(e)) => {
                tracing::error!(error = %e, "Could not spool upload");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Failed to store uploaded file".to_string(),
                )
            }
            ApiError::Validation(e) => {
                let status = match e {
                    ValidationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Some(e.kind()), e.to_string())
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Status store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Job status is unavailable".to_string(),
                )
            }
            ApiError::Queue(e) => {
                tracing::error!(error = %e, "Queue error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    None,
                    "Validation queue is unavailable".to_string(),
                )
            }
            ApiError::JobNotFound(id) => {
                (StatusCode::NOT_FOUND, None, format!("Job {id} not found"))
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, None, msg.clone()),
        };

        let body = match kind {
            Some(kind) => json!({ "detail": detail, "kind": kind }),
            None => json!({ "detail": detail }),
        };
        (status, axum::Json(body)).into_response()
    }
}
