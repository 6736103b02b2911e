use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address. Unused by worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the job queue and status store
    pub redis_url: String,

    /// Command line for the validation engine; the input file path and
    /// output directory are appended as the two positional arguments
    #[serde(default = "default_engine_command")]
    pub engine_command: String,

    /// Directory where uploaded inputs and scratch dirs are spooled
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,

    /// When false, bulk uploads run inline instead of being queued
    #[serde(default = "default_queue_enabled")]
    pub queue_enabled: bool,

    /// Engine time budget for queued bulk jobs
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Engine time budget for synchronous bulk and forceful runs
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// Engine time budget for single manually-entered numbers
    #[serde(default = "default_manual_timeout_secs")]
    pub manual_timeout_secs: u64,

    /// Slack added to the job timeout before a claim lease expires
    #[serde(default = "default_lease_grace_secs")]
    pub lease_grace_secs: u64,

    /// How long finished job records stay readable by pollers
    #[serde(default = "default_result_retention_secs")]
    pub result_retention_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_engine_command() -> String {
    "java -jar target/phone-validator-1.0.0.jar".to_string()
}

fn default_spool_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_queue_enabled() -> bool {
    true
}

fn default_job_timeout_secs() -> u64 {
    600
}

fn default_sync_timeout_secs() -> u64 {
    120
}

fn default_manual_timeout_secs() -> u64 {
    60
}

fn default_lease_grace_secs() -> u64 {
    120
}

fn default_result_retention_secs() -> u64 {
    500
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn manual_timeout(&self) -> Duration {
        Duration::from_secs(self.manual_timeout_secs)
    }

    /// Claim leases outlive the engine timeout by the grace window, so
    /// only a dead worker's lease ever expires.
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs + self.lease_grace_secs)
    }

    pub fn result_retention(&self) -> Duration {
        Duration::from_secs(self.result_retention_secs)
    }
}
