//! Validation engine invocation.
//!
//! The engine is an external program (the packaged Java validator by
//! default) invoked once per job with two positional arguments: the
//! input artifact path and an output directory. It communicates results
//! exclusively through files written into that directory; stdout is
//! discarded and stderr is captured for diagnostics.
//!
//! [`ValidationEngine`] abstracts the invocation so the worker and the
//! synchronous handlers do not care whether they are driving a real
//! subprocess or the scripted double used in tests.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stderr captured from the engine process (64 KiB).
///
/// Output beyond this limit is truncated to keep failure diagnostics
/// bounded in memory and in job records.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Outcome of a completed engine process.
///
/// A non-zero exit code is still an `Ok` outcome at this layer; the
/// result translator decides what it means for the job.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub exit_code: i32,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Static availability report for the health endpoint.
#[derive(Debug, Clone)]
pub struct EngineProbe {
    pub available: bool,
    pub detail: String,
}

/// Capability to run one validation pass over an input artifact.
#[async_trait]
pub trait ValidationEngine: Send + Sync {
    /// Run the engine against `input_path`, directing result artifacts
    /// into `output_dir`. Enforces `timeout` as wall-clock time; on
    /// expiry the process is killed and [`EngineError::Timeout`] is
    /// returned.
    async fn run(
        &self,
        input_path: &Path,
        output_dir: &Path,
        timeout: Duration,
    ) -> Result<EngineOutcome, EngineError>;

    /// Cheap availability check, without spawning anything.
    fn probe(&self) -> EngineProbe;
}

/// Engine that spawns an external process per run.
///
/// The configured command string is split on whitespace into program
/// and arguments; the input path and output directory are appended as
/// the final two arguments.
pub struct SubprocessEngine {
    program: String,
    args: Vec<String>,
}

impl SubprocessEngine {
    pub fn from_command(command: &str) -> Result<Self, EngineError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| EngineError::NotConfigured("engine command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// The jar argument of the configured command, if there is one.
    fn jar_path(&self) -> Option<&str> {
        self.args.iter().map(String::as_str).find(|a| a.ends_with(".jar"))
    }
}

#[async_trait]
impl ValidationEngine for SubprocessEngine {
    async fn run(
        &self,
        input_path: &Path,
        output_dir: &Path,
        timeout: Duration,
    ) -> Result<EngineOutcome, EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(input_path)
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Guarantees the child dies if the timeout fires or the
            // caller's future is cancelled.
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(EngineError::Spawn)?;

        // Read stderr in a spawned task so `child.wait()` can borrow
        // the child mutably at the same time.
        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle).await });

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let stderr_bytes = stderr_task.await.unwrap_or_default();
                Ok(EngineOutcome {
                    exit_code: status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(EngineError::Spawn(e)),
            Err(_elapsed) => {
                // `child` drops here and is killed via kill_on_drop.
                stderr_task.abort();
                Err(EngineError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                })
            }
        }
    }

    fn probe(&self) -> EngineProbe {
        match self.jar_path() {
            Some(jar) => {
                let available = Path::new(jar).is_file();
                EngineProbe {
                    available,
                    detail: jar.to_string(),
                }
            }
            // Non-jar commands are taken on faith; spawning would be
            // the only way to verify them.
            None => EngineProbe {
                available: true,
                detail: self.program.clone(),
            },
        }
    }
}

/// Read a stream to the end, capped at [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

/// Engine double that writes prescribed artifacts instead of spawning
/// a process. Used by the pipeline tests and offline development.
#[derive(Default)]
pub struct ScriptedEngine {
    artifacts: Vec<(String, String)>,
    exit_code: i32,
    stderr: String,
    force_timeout: bool,
}

impl ScriptedEngine {
    pub fn succeeding(artifacts: Vec<(String, String)>) -> Self {
        Self {
            artifacts,
            ..Self::default()
        }
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stderr: stderr.to_string(),
            ..Self::default()
        }
    }

    pub fn timing_out() -> Self {
        Self {
            force_timeout: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ValidationEngine for ScriptedEngine {
    async fn run(
        &self,
        _input_path: &Path,
        output_dir: &Path,
        _timeout: Duration,
    ) -> Result<EngineOutcome, EngineError> {
        if self.force_timeout {
            return Err(EngineError::Timeout { elapsed_ms: 1 });
        }
        for (name, contents) in &self.artifacts {
            tokio::fs::write(output_dir.join(name), contents)
                .await
                .map_err(EngineError::Spawn)?;
        }
        Ok(EngineOutcome {
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
            duration_ms: 1,
        })
    }

    fn probe(&self) -> EngineProbe {
        EngineProbe {
            available: true,
            detail: "scripted".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to launch validation engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Validation engine timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Validation engine is not configured: {0}")]
    NotConfigured(String),
}
