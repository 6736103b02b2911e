//! Translation of engine output into a [`ValidationReport`].
//!
//! The engine communicates through three JSON artifacts in the job's
//! scratch directory. This module turns a finished
//! [`EngineOutcome`] plus that directory into either a report or a
//! classified [`ValidationError`], without touching job state; the
//! caller decides what a failure means for the job.

use std::path::Path;

use chrono::Utc;

use super::engine::{EngineError, EngineOutcome};
use crate::models::phone::{EngineSummary, PhoneRecord, ValidationReport};

/// Artifact names the engine writes into its output directory.
pub const VALID_ARTIFACT: &str = "valid_numbers.json";
pub const INVALID_ARTIFACT: &str = "invalid_numbers.json";
pub const SUMMARY_ARTIFACT: &str = "summary.json";

/// Interpret a completed engine run.
///
/// Counts are recomputed from the record lists rather than read from
/// the summary, which self-reports them inconsistently. The summary's
/// `total_numbers` is kept as the success-rate denominator and
/// `valid_by_country` becomes the country breakdown.
pub fn translate(
    outcome: &EngineOutcome,
    output_dir: &Path,
) -> Result<ValidationReport, ValidationError> {
    if outcome.exit_code != 0 {
        return Err(ValidationError::EngineExecution {
            exit_code: outcome.exit_code,
            stderr: outcome.stderr.trim().to_string(),
        });
    }

    let valid_numbers: Vec<PhoneRecord> = read_artifact(output_dir, VALID_ARTIFACT)?;
    let invalid_numbers: Vec<PhoneRecord> = read_artifact(output_dir, INVALID_ARTIFACT)?;
    let summary: EngineSummary = read_artifact(output_dir, SUMMARY_ARTIFACT)?;

    let valid_count = valid_numbers.len() as u64;
    let invalid_count = invalid_numbers.len() as u64;
    let total_numbers = summary.total_numbers;
    let success_rate = if total_numbers > 0 {
        valid_count as f64 / total_numbers as f64 * 100.0
    } else {
        0.0
    };

    Ok(ValidationReport {
        status: "success".to_string(),
        total_numbers,
        valid_count,
        invalid_count,
        success_rate,
        valid_numbers,
        invalid_numbers,
        country_breakdown: summary.valid_by_country,
        timestamp: summary
            .timestamp
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    })
}

fn read_artifact<T: serde::de::DeserializeOwned>(
    dir: &Path,
    name: &'static str,
) -> Result<T, ValidationError> {
    let bytes = std::fs::read(dir.join(name)).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ValidationError::MissingArtifact { name }
        } else {
            ValidationError::ArtifactIo { name, source: e }
        }
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|source| ValidationError::ParseError { name, source })
}

/// A validation run that did not produce a report.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Validation engine failed with exit code {exit_code}: {stderr}")]
    EngineExecution { exit_code: i32, stderr: String },

    #[error("Validation timeout - file too large or processing error")]
    Timeout { elapsed_ms: u64 },

    #[error("Validation result file not found: {name}")]
    MissingArtifact { name: &'static str },

    #[error("Failed to read validation results from {name}: {source}")]
    ArtifactIo {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse validation results from {name}: {source}")]
    ParseError {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to launch validation engine: {0}")]
    Launch(String),
}

impl ValidationError {
    /// Stable machine-readable kind recorded on failed jobs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EngineExecution { .. } | Self::Launch(_) => "engine_execution_error",
            Self::Timeout { .. } => "validation_timeout",
            Self::MissingArtifact { .. } | Self::ArtifactIo { .. } => "missing_result_artifact",
            Self::ParseError { .. } => "result_parse_error",
        }
    }
}

impl From<EngineError> for ValidationError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Spawn(e) => Self::Launch(e.to_string()),
            EngineError::Timeout { elapsed_ms } => Self::Timeout { elapsed_ms },
            EngineError::NotConfigured(reason) => Self::Launch(reason),
        }
    }
}
