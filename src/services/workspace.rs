//! Scoped ownership of a job's temporary filesystem resources.
//!
//! A [`JobWorkspace`] holds the job's spooled input artifact and a
//! fresh scratch directory for the engine's output. Dropping the guard
//! deletes both, so every exit path out of job execution (success,
//! each failure kind, timeout, or a panic unwinding through) releases
//! the same way. Cleanup problems are logged and never escalate; by
//! the time the guard drops, the job's outcome is already decided.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Guard owning one job's input artifact and scratch directory.
pub struct JobWorkspace {
    input_path: PathBuf,
    scratch_path: PathBuf,
    scratch: Option<TempDir>,
}

impl JobWorkspace {
    /// Take ownership of `input_path` and create a fresh scratch
    /// directory under `scratch_parent`. Scratch directories are never
    /// reused and never shared between concurrently running jobs.
    ///
    /// The input artifact is owned from the moment of the call: if the
    /// scratch directory cannot be created, the artifact is removed
    /// before the error is returned.
    pub fn acquire(input_path: PathBuf, scratch_parent: &Path) -> io::Result<Self> {
        let scratch = match tempfile::Builder::new()
            .prefix("phone-validate-")
            .tempdir_in(scratch_parent)
        {
            Ok(scratch) => scratch,
            Err(e) => {
                remove_input(&input_path);
                return Err(e);
            }
        };
        let scratch_path = scratch.path().to_path_buf();
        Ok(Self {
            input_path,
            scratch_path,
            scratch: Some(scratch),
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_path
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            if let Err(e) = scratch.close() {
                tracing::warn!(
                    scratch_dir = %self.scratch_path.display(),
                    error = %e,
                    "Could not remove scratch directory"
                );
            }
        }
        remove_input(&self.input_path);
    }
}

fn remove_input(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                input_path = %path.display(),
                error = %e,
                "Could not remove input artifact"
            );
        }
    }
}
