//! Job status store backed by Redis hashes.
//!
//! One hash per job, keyed by job ID, holding the state machine fields
//! plus the result or error of a finished run. Workers are the only
//! writers for a claimed job (the queue serializes claims), so the
//! check-then-set transitions here never race; pollers only read.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::{Job, JobState};
use crate::models::phone::ValidationReport;

const JOB_KEY_PREFIX: &str = "phone_validate:job:";

/// Terminal-outcome counters, bumped once per job by the terminal
/// marks below and read back by the queue's depth report.
pub(crate) const SUCCEEDED_COUNT_KEY: &str = "phone_validate:stats:succeeded";
pub(crate) const FAILED_COUNT_KEY: &str = "phone_validate:stats:failed";

pub(crate) fn job_key(id: Uuid) -> String {
    format!("{JOB_KEY_PREFIX}{id}")
}

/// Redis-backed store of job metadata records.
pub struct JobStore {
    client: redis::Client,
    retention: Duration,
}

impl JobStore {
    pub fn new(redis_url: &str, retention: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(StoreError::Redis)?;
        Ok(Self { client, retention })
    }

    /// Write a fresh job record. The submission path normally creates
    /// the record atomically with the queue entry instead (see
    /// `JobQueue::enqueue`); this standalone form exists for tooling
    /// and tests.
    pub async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        let fields = encode_job(job)?;
        conn.hset_multiple::<_, _, _, ()>(job_key(job.id), &fields)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    /// Fetch a job record. `Ok(None)` means the ID is unknown, never
    /// submitted, or expired past the retention window.
    pub async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let mut conn = self.connect().await?;
        let map: HashMap<String, String> = conn
            .hgetall(job_key(id))
            .await
            .map_err(StoreError::Redis)?;
        if map.is_empty() {
            return Ok(None);
        }
        decode_job(id, &map).map(Some)
    }

    /// Transition a claimed job to running and stamp `started_at`.
    ///
    /// A second attempt at a reaped job re-enters here from `Running`
    /// when the requeue could not reset the state, so only terminal
    /// states are rejected; the new attempt re-records its own
    /// `started_at`.
    pub async fn mark_running(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        let state = self.current_state(&mut conn, id).await?;
        if state.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id,
                from: state,
                to: JobState::Running,
            });
        }
        let fields = [
            ("state".to_string(), JobState::Running.to_string()),
            ("started_at".to_string(), Utc::now().to_rfc3339()),
            ("progress".to_string(), "Starting validation".to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(job_key(id), &fields)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    /// Update the free-text progress message, last write wins.
    pub async fn set_progress(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        conn.hset::<_, _, _, ()>(job_key(id), "progress", message)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    /// Record a successful terminal outcome.
    ///
    /// Idempotent when the job already succeeded (first result wins);
    /// rejected when the job already failed; a job never changes its
    /// terminal outcome.
    pub async fn mark_succeeded(&self, id: Uuid, report: &ValidationReport) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        match self.current_state(&mut conn, id).await? {
            JobState::Succeeded => return Ok(()),
            JobState::Failed => {
                return Err(StoreError::TerminalConflict {
                    id,
                    current: JobState::Failed,
                    attempted: JobState::Succeeded,
                })
            }
            _ => {}
        }
        let key = job_key(id);
        let fields = [
            ("state".to_string(), JobState::Succeeded.to_string()),
            ("ended_at".to_string(), Utc::now().to_rfc3339()),
            ("progress".to_string(), "Completed".to_string()),
            ("result".to_string(), serde_json::to_string(report)?),
        ];
        redis::pipe()
            .atomic()
            .hset_multiple(&key, &fields)
            .incr(SUCCEEDED_COUNT_KEY, 1u64)
            .expire(&key, self.retention.as_secs() as i64)
            .query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    /// Record a failed terminal outcome with its error kind. Same
    /// idempotency and conflict rules as `mark_succeeded`.
    pub async fn mark_failed(&self, id: Uuid, kind: &str, message: &str) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        match self.current_state(&mut conn, id).await? {
            JobState::Failed => return Ok(()),
            JobState::Succeeded => {
                return Err(StoreError::TerminalConflict {
                    id,
                    current: JobState::Succeeded,
                    attempted: JobState::Failed,
                })
            }
            _ => {}
        }
        let key = job_key(id);
        let fields = [
            ("state".to_string(), JobState::Failed.to_string()),
            ("ended_at".to_string(), Utc::now().to_rfc3339()),
            ("error".to_string(), message.to_string()),
            ("error_kind".to_string(), kind.to_string()),
        ];
        redis::pipe()
            .atomic()
            .hset_multiple(&key, &fields)
            .incr(FAILED_COUNT_KEY, 1u64)
            .expire(&key, self.retention.as_secs() as i64)
            .query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    /// Return an abandoned job to the queued state so the next attempt
    /// records fresh `started_at`/progress. Used by the lease reaper;
    /// terminal jobs are never requeued.
    pub async fn mark_requeued(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        let state = self.current_state(&mut conn, id).await?;
        if state.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id,
                from: state,
                to: JobState::Queued,
            });
        }
        let key = job_key(id);
        redis::pipe()
            .atomic()
            .hset(&key, "state", JobState::Queued.to_string())
            .hdel(&key, "started_at")
            .hdel(&key, "progress")
            .query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn connect(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::Redis)
    }

    async fn current_state(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: Uuid,
    ) -> Result<JobState, StoreError> {
        let raw: Option<String> = conn
            .hget(job_key(id), "state")
            .await
            .map_err(StoreError::Redis)?;
        let raw = raw.ok_or(StoreError::Missing(id))?;
        raw.parse::<JobState>()
            .map_err(|_| StoreError::Decode(id, format!("unknown state '{raw}'")))
    }
}

/// Encode a job into Redis hash fields. Optional fields are simply
/// absent from the hash rather than stored as sentinels.
pub(crate) fn encode_job(job: &Job) -> Result<Vec<(String, String)>, StoreError> {
    let mut fields = vec![
        ("state".to_string(), job.state.to_string()),
        ("filename".to_string(), job.filename.clone()),
        (
            "input_path".to_string(),
            job.input_path.to_string_lossy().into_owned(),
        ),
        ("enqueued_at".to_string(), job.enqueued_at.to_rfc3339()),
    ];
    if let Some(at) = job.started_at {
        fields.push(("started_at".to_string(), at.to_rfc3339()));
    }
    if let Some(at) = job.ended_at {
        fields.push(("ended_at".to_string(), at.to_rfc3339()));
    }
    if let Some(progress) = &job.progress {
        fields.push(("progress".to_string(), progress.clone()));
    }
    if let Some(report) = &job.result {
        fields.push(("result".to_string(), serde_json::to_string(report)?));
    }
    if let Some(error) = &job.error {
        fields.push(("error".to_string(), error.clone()));
    }
    if let Some(kind) = &job.error_kind {
        fields.push(("error_kind".to_string(), kind.clone()));
    }
    Ok(fields)
}

/// Decode a job from its Redis hash. Missing required fields or
/// unparsable values are corruption, reported as such rather than
/// papered over with defaults.
pub(crate) fn decode_job(id: Uuid, map: &HashMap<String, String>) -> Result<Job, StoreError> {
    let require = |field: &str| -> Result<&String, StoreError> {
        map.get(field)
            .ok_or_else(|| StoreError::Decode(id, format!("missing field '{field}'")))
    };
    let parse_time = |field: &str, raw: &str| -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::Decode(id, format!("bad timestamp in '{field}': {e}")))
    };

    let state_raw = require("state")?;
    let state = state_raw
        .parse::<JobState>()
        .map_err(|_| StoreError::Decode(id, format!("unknown state '{state_raw}'")))?;

    let started_at = map
        .get("started_at")
        .map(|raw| parse_time("started_at", raw))
        .transpose()?;
    let ended_at = map
        .get("ended_at")
        .map(|raw| parse_time("ended_at", raw))
        .transpose()?;
    let result = map
        .get("result")
        .map(|raw| {
            serde_json::from_str::<ValidationReport>(raw)
                .map_err(|e| StoreError::Decode(id, format!("bad result payload: {e}")))
        })
        .transpose()?;

    Ok(Job {
        id,
        state,
        filename: require("filename")?.clone(),
        input_path: PathBuf::from(require("input_path")?),
        enqueued_at: parse_time("enqueued_at", require("enqueued_at")?)?,
        started_at,
        ended_at,
        progress: map.get("progress").cloned(),
        result,
        error: map.get("error").cloned(),
        error_kind: map.get("error_kind").cloned(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("job {0} has no record")]
    Missing(Uuid),

    #[error("job record {0} is corrupt: {1}")]
    Decode(Uuid, String),

    #[error("job {id} is already {current}, cannot mark it {attempted}")]
    TerminalConflict {
        id: Uuid,
        current: JobState,
        attempted: JobState,
    },

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobState,
        to: JobState,
    },
}
