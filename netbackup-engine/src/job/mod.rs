//! Backup job state.
//!
//! A `BackupJob` is the record of one backup attempt. Its fields are
//! mutated only by the task executing that attempt; everyone else reads
//! cloned snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::transport::ProtocolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Verified,
}

impl JobStatus {
    /// Completed, Failed and Verified jobs have an end time and are eligible
    /// for the retention sweep.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Verified)
    }
}

/// Byte-level and phase-level progress for one attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub current_phase: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub job_id: String,
    /// Process-wide creation sequence number; breaks priority ties.
    pub seq: u64,
    pub device_address: String,
    pub protocol: ProtocolKind,
    pub target_path: PathBuf,
    pub config_map: HashMap<String, String>,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub result: HashMap<String, serde_json::Value>,
}

impl BackupJob {
    pub fn new(
        seq: u64,
        device_address: &str,
        protocol: ProtocolKind,
        target_path: PathBuf,
        config_map: HashMap<String, String>,
        created: DateTime<Utc>,
    ) -> Self {
        let job_id = format!(
            "{}_{}_{:06}",
            device_address,
            created.format("%Y%m%d%H%M%S"),
            seq
        );
        Self {
            job_id,
            seq,
            device_address: device_address.to_string(),
            protocol,
            target_path,
            config_map,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            result: HashMap::new(),
        }
    }

    /// Pending → InProgress.
    pub fn start(&mut self) {
        if self.status != JobStatus::Pending {
            return;
        }
        self.status = JobStatus::InProgress;
        self.progress.start_time = Some(Utc::now());
        self.progress.current_phase = "connecting".to_string();
    }

    /// InProgress → Completed or Failed. No-op once the job has ended.
    pub fn complete(&mut self, success: bool, message: impl Into<String>) {
        if self.status != JobStatus::InProgress {
            return;
        }
        let message = message.into();
        self.progress.end_time = Some(Utc::now());
        if success {
            self.status = JobStatus::Completed;
        } else {
            self.status = JobStatus::Failed;
            self.progress.error_message = Some(message.clone());
        }
        self.result
            .insert("message".to_string(), serde_json::Value::String(message));
    }

    /// Completed → Verified; every other source state is a no-op. Returns
    /// whether the status changed.
    pub fn verify(&mut self, ok: bool) -> bool {
        if ok && self.status == JobStatus::Completed {
            self.status = JobStatus::Verified;
            true
        } else {
            false
        }
    }

    pub fn set_phase(&mut self, phase: &str) {
        self.progress.current_phase = phase.to_string();
    }

    /// Wall-clock duration of the attempt, once both endpoints are known.
    pub fn duration(&self) -> Option<Duration> {
        match (self.progress.start_time, self.progress.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Percentage of bytes transferred, 0 when the total is unknown.
    pub fn percentage_complete(&self) -> f64 {
        if self.progress.total_bytes == 0 {
            return 0.0;
        }
        self.progress.transferred_bytes as f64 / self.progress.total_bytes as f64 * 100.0
    }
}
