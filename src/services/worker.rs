//! Job execution pipeline.
//!
//! [`process_next_job`] is the worker binary's unit of work: claim one
//! job, run it through the engine, record the terminal outcome and
//! release the queue entry. [`run_inline`] is the same engine pass
//! without queue or store, used by the synchronous endpoints.
//! [`reap_abandoned`] recovers jobs whose worker died mid-run.
//!
//! Validation failures are terminal job outcomes, not worker errors;
//! only queue and store trouble surfaces out of this module.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::engine::ValidationEngine;
use super::queue::QueueError;
use super::store::StoreError;
use super::translator::{self, ValidationError};
use super::workspace::JobWorkspace;
use crate::app_state::AppState;
use crate::models::job::Job;
use crate::models::phone::ValidationReport;

/// Progress messages pollers observe between state transitions.
pub const PROGRESS_RUNNING_ENGINE: &str = "Running validation engine...";
pub const PROGRESS_READING_RESULTS: &str = "Reading results...";

/// Claim and execute the next queued job.
///
/// Returns `Ok(true)` when a job was processed (whatever its outcome)
/// and `Ok(false)` when the claim wait elapsed with the queue empty.
pub async fn process_next_job(state: &AppState, block: Duration) -> Result<bool, WorkerError> {
    let id = match state.queue.claim(block, state.config.lease_ttl()).await? {
        Some(id) => id,
        None => return Ok(false),
    };
    execute_claimed(state, id).await?;
    Ok(true)
}

/// Run one claimed job to a terminal state and release its claim.
///
/// If this returns an error the claim stays leased; once the lease
/// expires the reaper hands the job to another worker.
pub async fn execute_claimed(state: &AppState, id: Uuid) -> Result<(), WorkerError> {
    let Some(job) = state.store.get(id).await? else {
        tracing::warn!(job_id = %id, "Claimed job has no status record, dropping");
        state.queue.complete(id).await?;
        return Ok(());
    };

    match state.store.mark_running(id).await {
        Ok(()) => {}
        Err(StoreError::InvalidTransition { from, .. }) => {
            // A slow previous attempt finished after its lease expired
            // and the reaper requeued the job anyway.
            tracing::warn!(job_id = %id, state = %from, "Claimed job already decided, dropping");
            state.queue.complete(id).await?;
            return Ok(());
        }
        Err(StoreError::Missing(_)) => {
            state.queue.complete(id).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(job_id = %id, filename = %job.filename, "Processing validation job");
    let started = Instant::now();

    match run_claimed_pipeline(state, &job).await {
        Ok(report) => {
            record_success(state, id, &report).await?;
            metrics::histogram!("validation_processing_seconds")
                .record(started.elapsed().as_secs_f64());
        }
        Err(e) => record_failure(state, id, &e).await?,
    }

    state.queue.complete(id).await?;
    Ok(())
}

/// The engine pass for a claimed job, with progress updates pollers
/// can observe. The workspace guard releases the input artifact and
/// scratch directory on every path out of this function.
async fn run_claimed_pipeline(
    state: &AppState,
    job: &Job,
) -> Result<ValidationReport, ValidationError> {
    let workspace = acquire_workspace(job.input_path.clone(), &state.config.spool_dir)?;

    report_progress(state, job.id, PROGRESS_RUNNING_ENGINE).await;
    let outcome = state
        .engine
        .run(
            workspace.input_path(),
            workspace.scratch_dir(),
            state.config.job_timeout(),
        )
        .await?;

    report_progress(state, job.id, PROGRESS_READING_RESULTS).await;
    translator::translate(&outcome, workspace.scratch_dir())
}

/// Run one validation pass without touching the queue or the store.
///
/// The synchronous endpoints use this: same spooled input, same engine
/// protocol, same cleanup guarantees, with the report handed straight
/// back to the caller instead of a job record.
pub async fn run_inline(
    engine: &dyn ValidationEngine,
    input_path: PathBuf,
    scratch_parent: &Path,
    timeout: Duration,
) -> Result<ValidationReport, ValidationError> {
    let workspace = acquire_workspace(input_path, scratch_parent)?;
    let outcome = engine
        .run(workspace.input_path(), workspace.scratch_dir(), timeout)
        .await?;
    translator::translate(&outcome, workspace.scratch_dir())
}

/// Recover jobs stranded on the processing list.
///
/// A processing entry whose lease has expired belongs to a worker that
/// has been gone longer than any legitimate run takes. Unfinished jobs
/// go back to the front of the queue; finished ones just lose their
/// stale claim. Returns how many jobs were requeued.
pub async fn reap_abandoned(state: &AppState) -> Result<u64, WorkerError> {
    let mut requeued = 0;
    for id in state.queue.processing_ids().await? {
        if state.queue.lease_alive(id).await? {
            continue;
        }
        match state.store.get(id).await? {
            Some(job) if job.state.is_terminal() => {
                // Finished, but its worker died before releasing the claim.
                state.queue.drop_processing(id).await?;
                tracing::info!(job_id = %id, "Released claim left by finished job");
            }
            Some(_) => {
                state.queue.requeue_front(id).await?;
                if let Err(e) = state.store.mark_requeued(id).await {
                    tracing::warn!(job_id = %id, error = %e, "Requeued job kept stale status fields");
                }
                requeued += 1;
                tracing::warn!(job_id = %id, "Requeued job abandoned by a dead worker");
            }
            None => {
                state.queue.drop_processing(id).await?;
                tracing::warn!(job_id = %id, "Dropped abandoned job with no status record");
            }
        }
    }
    Ok(requeued)
}

fn acquire_workspace(
    input_path: PathBuf,
    scratch_parent: &Path,
) -> Result<JobWorkspace, ValidationError> {
    JobWorkspace::acquire(input_path, scratch_parent)
        .map_err(|e| ValidationError::Launch(format!("Failed to prepare job workspace: {e}")))
}

async fn record_success(
    state: &AppState,
    id: Uuid,
    report: &ValidationReport,
) -> Result<(), WorkerError> {
    match state.store.mark_succeeded(id, report).await {
        Ok(()) => {
            metrics::counter!("validation_jobs_completed").increment(1);
            tracing::info!(
                job_id = %id,
                valid = report.valid_count,
                invalid = report.invalid_count,
                "Job completed successfully"
            );
            Ok(())
        }
        Err(StoreError::TerminalConflict { current, .. }) => {
            tracing::warn!(job_id = %id, current = %current, "Job already decided, keeping first outcome");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn record_failure(
    state: &AppState,
    id: Uuid,
    error: &ValidationError,
) -> Result<(), WorkerError> {
    match state
        .store
        .mark_failed(id, error.kind(), &error.to_string())
        .await
    {
        Ok(()) => {
            metrics::counter!("validation_jobs_failed", "kind" => error.kind()).increment(1);
            tracing::error!(job_id = %id, kind = error.kind(), error = %error, "Job failed");
            Ok(())
        }
        Err(StoreError::TerminalConflict { current, .. }) => {
            tracing::warn!(job_id = %id, current = %current, "Job already decided, keeping first outcome");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn report_progress(state: &AppState, id: Uuid, message: &str) {
    // Progress is cosmetic; only terminal marks carry correctness.
    if let Err(e) = state.store.set_progress(id, message).await {
        tracing::warn!(job_id = %id, error = %e, "Could not update job progress");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::ScriptedEngine;
    use crate::services::translator::{INVALID_ARTIFACT, SUMMARY_ARTIFACT, VALID_ARTIFACT};

    fn spooled_input(dir: &Path) -> PathBuf {
        let input = dir.join("input.csv");
        std::fs::write(&input, "rowNumber,id,email,name,phone_number,country,platform\n")
            .unwrap();
        input
    }

    #[tokio::test]
    async fn test_run_inline_produces_report_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = spooled_input(dir.path());
        let engine = ScriptedEngine::succeeding(vec![
            (VALID_ARTIFACT.to_string(), "[]".to_string()),
            (INVALID_ARTIFACT.to_string(), "[]".to_string()),
            (SUMMARY_ARTIFACT.to_string(), r#"{"total_numbers": 0}"#.to_string()),
        ]);

        let report = run_inline(&engine, input.clone(), dir.path(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(report.status, "success");
        assert!(!input.exists(), "input artifact should be cleaned up");
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            0,
            "no scratch dirs should remain"
        );
    }

    #[tokio::test]
    async fn test_run_inline_failure_cleans_up_and_keeps_kind() {
        let dir = tempfile::tempdir().unwrap();
        let input = spooled_input(dir.path());
        // Engine completes but writes nothing.
        let engine = ScriptedEngine::succeeding(vec![]);

        let err = run_inline(&engine, input.clone(), dir.path(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_result_artifact");
        assert!(!input.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_inline_nonzero_exit_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = spooled_input(dir.path());
        let engine = ScriptedEngine::failing(2, "java.lang.OutOfMemoryError");

        let err = run_inline(&engine, input.clone(), dir.path(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "engine_execution_error");
        assert!(err.to_string().contains("OutOfMemoryError"));
        assert!(!input.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_inline_timeout_kind() {
        let dir = tempfile::tempdir().unwrap();
        let input = spooled_input(dir.path());
        let engine = ScriptedEngine::timing_out();

        let err = run_inline(&engine, input.clone(), dir.path(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_timeout");
        assert!(!input.exists());
    }
}
