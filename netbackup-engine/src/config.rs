//! Engine configuration.
//!
//! Defaults match the reference deployment; a TOML file and environment
//! variables can override the operational knobs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::ProtocolKind;
use crate::utils::errors::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum concurrently executing backup jobs
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Idle transport instances kept per (protocol, device) key
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// How long to wait for an idle pooled transport before building a fresh one (ms)
    #[serde(default = "default_pool_acquire_timeout_ms")]
    pub pool_acquire_timeout_ms: u64,

    /// How long to wait when returning a transport before discarding it (ms)
    #[serde(default = "default_pool_release_timeout_ms")]
    pub pool_release_timeout_ms: u64,

    /// Fail a job when the validator itself errors. Clean rejections always fail.
    #[serde(default)]
    pub strict_validation: bool,

    /// Directory backup artifacts are written to
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,

    /// Protocol used when a job names an unknown one
    #[serde(default)]
    pub default_protocol: ProtocolKind,
}

fn default_max_concurrent_jobs() -> usize {
    5
}

fn default_pool_capacity() -> usize {
    5
}

fn default_pool_acquire_timeout_ms() -> u64 {
    500
}

fn default_pool_release_timeout_ms() -> u64 {
    1000
}

fn default_backup_root() -> PathBuf {
    PathBuf::from("backups")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            pool_capacity: default_pool_capacity(),
            pool_acquire_timeout_ms: default_pool_acquire_timeout_ms(),
            pool_release_timeout_ms: default_pool_release_timeout_ms(),
            strict_validation: false,
            backup_root: default_backup_root(),
            default_protocol: ProtocolKind::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Apply environment overrides for the operational knobs.
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = std::env::var("NETBACKUP_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.max_concurrent_jobs = v;
        }
        if let Ok(v) = std::env::var("NETBACKUP_BACKUP_ROOT") {
            self.backup_root = PathBuf::from(v);
        }
        self
    }

    pub fn pool_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_acquire_timeout_ms)
    }

    pub fn pool_release_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_release_timeout_ms)
    }
}
