use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::phone::ValidationReport;

/// Lifecycle state of a validation job.
///
/// Wire strings match what pollers expect: `queued`, `started`,
/// `finished`, `failed`. Transitions are monotonic within an attempt
/// (`Queued -> Running -> Succeeded | Failed`); the only sanctioned
/// backwards move is the lease reaper returning an abandoned `Running`
/// job to `Queued` for another attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
pub enum JobState {
    #[serde(rename = "queued")]
    #[strum(serialize = "queued")]
    Queued,
    #[serde(rename = "started")]
    #[strum(serialize = "started")]
    Running,
    #[serde(rename = "finished")]
    #[strum(serialize = "finished")]
    Succeeded,
    #[serde(rename = "failed")]
    #[strum(serialize = "failed")]
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// A queued phone validation job and its status record.
///
/// Exactly one of `result` / `error` is populated, and only once the
/// state is terminal. The job owns its spooled input file until a
/// worker finishes with it; the worker deletes the file on every
/// outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub state: JobState,
    /// Original upload filename, echoed back to pollers.
    pub filename: String,
    /// Spooled input artifact consumed (and then deleted) by the worker.
    pub input_path: PathBuf,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Free-text progress message, last write wins while running.
    pub progress: Option<String>,
    pub result: Option<ValidationReport>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl Job {
    /// Create a freshly queued job for a spooled input artifact.
    ///
    /// IDs are random v4 UUIDs so concurrent submissions can never
    /// collide, unlike timestamp- or filename-derived schemes.
    pub fn new(filename: impl Into<String>, input_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: JobState::Queued,
            filename: filename.into(),
            input_path,
            enqueued_at: Utc::now(),
            started_at: None,
            ended_at: None,
            progress: None,
            result: None,
            error: None,
            error_kind: None,
        }
    }
}
