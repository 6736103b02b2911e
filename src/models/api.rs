use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::Job;
use crate::models::phone::ValidationReport;

/// Request to validate a single manually-entered number.
#[derive(Debug, Deserialize, Validate)]
pub struct ManualValidateRequest {
    #[garde(length(min = 1, max = 64))]
    pub phone: String,

    /// Two-letter region code hint (e.g. "US", "BR").
    #[garde(inner(length(min = 2, max = 2)))]
    pub country: Option<String>,
}

/// Request to test one number against every candidate country.
#[derive(Debug, Deserialize, Validate)]
pub struct ForcefulValidateRequest {
    #[garde(length(min = 1, max = 64))]
    pub phone: String,
}

/// Response after a bulk upload is queued.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
    /// 1-based place in line among queued jobs (1 = next to run).
    pub position: Option<u64>,
    pub message: String,
}

/// Response for polling a job's status.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl JobStatusResponse {
    /// Build the polling view of a job. `position` is meaningful only
    /// while the job is still queued.
    pub fn from_job(job: Job, position: Option<u64>) -> Self {
        Self {
            job_id: job.id,
            status: job.state.to_string(),
            progress: job.progress,
            position,
            enqueued_at: job.enqueued_at,
            started_at: job.started_at,
            ended_at: job.ended_at,
            result: job.result,
            error: job.error,
            error_kind: job.error_kind,
        }
    }
}
