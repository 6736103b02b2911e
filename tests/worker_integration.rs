//! Worker pipeline integration against a live Redis.
//!
//! Run with: cargo test --test worker_integration -- --ignored
//!
//! Set REDIS_URL to override the default (redis://127.0.0.1:6379).

mod fixtures;
mod helpers;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use phone_validator_api::models::job::JobState;
use phone_validator_api::models::phone::ValidationReport;
use phone_validator_api::services::engine::ScriptedEngine;
use phone_validator_api::services::{intake, worker};

const SAMPLE_CSV: &str = "\
rowNumber,id,email,name,phone_number,country,platform
1,lead-1,,,+13105551234,US,fb
2,lead-2,,,+5511987654321,BR,fb
3,lead-3,,,12345,,fb
";

/// Integration test: worker loop and lease reaper
///
/// This test verifies the complete integration:
/// 1. Submit through intake, process with one worker pass
/// 2. Input artifact is consumed and the claim fully released
/// 3. The reaper requeues an expired claim but skips a live one
/// 4. The recovered job completes on the next worker pass
/// 5. A finished job with a stale claim only loses the claim
///
/// Note: This requires a running Redis instance configured via
/// REDIS_URL.
#[tokio::test]
#[ignore] // Run with: cargo test --test worker_integration -- --ignored
async fn test_worker_and_reaper_lifecycle() {
    let spool = tempfile::tempdir().expect("Failed to create spool dir");
    let state = helpers::test_state(
        spool.path(),
        Arc::new(ScriptedEngine::succeeding(fixtures::standard_artifacts())),
    );

    // Start from an empty queue: drain entries left by aborted runs
    while let Some(stale) = state
        .queue
        .claim(Duration::from_millis(100), Duration::from_secs(1))
        .await
        .expect("Failed to drain queue")
    {
        state
            .queue
            .drop_processing(stale)
            .await
            .expect("Failed to drop stale entry");
    }
    for stale in state
        .queue
        .processing_ids()
        .await
        .expect("Failed to list processing entries")
    {
        state
            .queue
            .drop_processing(stale)
            .await
            .expect("Failed to drop stale entry");
    }

    // 1. Submit through intake and process with one worker pass
    let input = intake::spool_upload("leads.csv", SAMPLE_CSV.as_bytes(), spool.path())
        .expect("Failed to spool upload");
    assert!(input.exists());
    let job = intake::submit_job(&state.queue, "leads.csv", input.clone())
        .await
        .expect("Failed to submit job");

    let processed = worker::process_next_job(&state, Duration::from_secs(2))
        .await
        .expect("Worker pass failed");
    assert!(processed, "expected the worker to claim the submitted job");

    let done = state
        .store
        .get(job.id)
        .await
        .expect("Failed to read job")
        .expect("Job record missing");
    assert_eq!(done.state, JobState::Succeeded);
    assert_eq!(done.progress.as_deref(), Some("Completed"));
    assert!(done.started_at.is_some());
    assert!(done.ended_at.is_some());
    let report = done.result.expect("Result payload missing");
    assert_eq!(report.total_numbers, 3);
    assert_eq!(report.valid_count, 2);
    assert_eq!(report.invalid_count, 1);
    assert!((report.success_rate - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(report.country_breakdown.get("US"), Some(&1));

    // 2. The input artifact is consumed and the claim fully released
    assert!(!input.exists(), "worker must delete the input artifact");
    assert!(state
        .queue
        .processing_ids()
        .await
        .expect("Failed to list processing entries")
        .is_empty());
    assert!(!state
        .queue
        .lease_alive(job.id)
        .await
        .expect("Failed to read lease"));

    // 3. The reaper requeues an expired claim but skips a live one
    let input2 = intake::spool_upload("leads.csv", SAMPLE_CSV.as_bytes(), spool.path())
        .expect("Failed to spool upload");
    let job2 = intake::submit_job(&state.queue, "leads.csv", input2.clone())
        .await
        .expect("Failed to submit job");
    let input3 = intake::spool_upload("leads.csv", SAMPLE_CSV.as_bytes(), spool.path())
        .expect("Failed to spool upload");
    let job3 = intake::submit_job(&state.queue, "leads.csv", input3.clone())
        .await
        .expect("Failed to submit job");

    // A worker claims job2 with a lease about to expire, then dies; a
    // healthy worker holds job3 mid-run on a long lease
    let claimed = state
        .queue
        .claim(Duration::from_secs(2), Duration::from_secs(1))
        .await
        .expect("Failed to claim")
        .expect("Expected a queued job");
    assert_eq!(claimed, job2.id);
    state
        .store
        .mark_running(job2.id)
        .await
        .expect("Failed to mark running");
    let claimed = state
        .queue
        .claim(Duration::from_secs(2), Duration::from_secs(30))
        .await
        .expect("Failed to claim")
        .expect("Expected a queued job");
    assert_eq!(claimed, job3.id);
    state
        .store
        .mark_running(job3.id)
        .await
        .expect("Failed to mark running");

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let requeued = worker::reap_abandoned(&state)
        .await
        .expect("Reaper pass failed");
    assert_eq!(requeued, 1, "only the expired claim should be requeued");

    let recovered = state
        .store
        .get(job2.id)
        .await
        .expect("Failed to read job")
        .expect("Job record missing");
    assert_eq!(recovered.state, JobState::Queued);
    assert!(
        recovered.started_at.is_none(),
        "requeue clears the stale attempt"
    );
    assert_eq!(
        state
            .queue
            .position(job2.id)
            .await
            .expect("Failed to read position"),
        Some(1)
    );
    let untouched = state
        .store
        .get(job3.id)
        .await
        .expect("Failed to read job")
        .expect("Job record missing");
    assert_eq!(untouched.state, JobState::Running);
    assert!(state
        .queue
        .lease_alive(job3.id)
        .await
        .expect("Failed to read lease"));

    // 4. The recovered job completes on the next worker pass
    let processed = worker::process_next_job(&state, Duration::from_secs(2))
        .await
        .expect("Worker pass failed");
    assert!(processed);
    let done2 = state
        .store
        .get(job2.id)
        .await
        .expect("Failed to read job")
        .expect("Job record missing");
    assert_eq!(done2.state, JobState::Succeeded);
    assert!(!input2.exists());

    // The healthy worker finishes job3 as usual
    worker::execute_claimed(&state, job3.id)
        .await
        .expect("Failed to execute claimed job");
    let done3 = state
        .store
        .get(job3.id)
        .await
        .expect("Failed to read job")
        .expect("Job record missing");
    assert_eq!(done3.state, JobState::Succeeded);
    assert!(!input3.exists());
    assert!(state
        .queue
        .processing_ids()
        .await
        .expect("Failed to list processing entries")
        .is_empty());

    // 5. A finished job with a stale claim only loses the claim
    let input4 = intake::spool_upload("leads.csv", SAMPLE_CSV.as_bytes(), spool.path())
        .expect("Failed to spool upload");
    let job4 = intake::submit_job(&state.queue, "leads.csv", input4)
        .await
        .expect("Failed to submit job");
    let claimed = state
        .queue
        .claim(Duration::from_secs(2), Duration::from_secs(1))
        .await
        .expect("Failed to claim")
        .expect("Expected a queued job");
    assert_eq!(claimed, job4.id);
    state
        .store
        .mark_running(job4.id)
        .await
        .expect("Failed to mark running");
    let report = ValidationReport {
        status: "success".to_string(),
        total_numbers: 0,
        valid_count: 0,
        invalid_count: 0,
        success_rate: 0.0,
        valid_numbers: Vec::new(),
        invalid_numbers: Vec::new(),
        country_breakdown: BTreeMap::new(),
        timestamp: "2025-03-01 14:12:00".to_string(),
    };
    state
        .store
        .mark_succeeded(job4.id, &report)
        .await
        .expect("Failed to mark succeeded");

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let requeued = worker::reap_abandoned(&state)
        .await
        .expect("Reaper pass failed");
    assert_eq!(requeued, 0, "finished jobs are never requeued");
    assert!(state
        .queue
        .processing_ids()
        .await
        .expect("Failed to list processing entries")
        .is_empty());
    let settled = state
        .store
        .get(job4.id)
        .await
        .expect("Failed to read job")
        .expect("Job record missing");
    assert_eq!(settled.state, JobState::Succeeded);

    println!("✅ All worker and reaper integration steps passed!");
}
