//! Backup orchestration pipeline.
//!
//! Composes the dispatcher, connection pool, config cache and transport
//! contract: creates jobs, drives them through connect → fetch → diff →
//! validate → persist → complete, and answers job queries. Failures inside
//! a running pipeline are recorded on the job, never thrown to the caller,
//! so one failing job cannot abort the dispatcher or its neighbours.

pub mod tracker;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::ConfigCache;
use crate::config::EngineConfig;
use crate::dispatch::PriorityDispatcher;
use crate::job::{BackupJob, JobStatus};
use crate::pool::ConnectionPool;
use crate::provider::ConfigProvider;
use crate::transport::{Transport, Validation};
use crate::utils::errors::{EngineError, Result};
use crate::utils::format::format_bytes;
use tracker::CancelRegistry;

/// How a `start_job` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This call ran the job's pipeline to a terminal state.
    Executed,
    /// Another job was at the head of the queue; this job stays pending and
    /// must be started again.
    Yielded,
}

type JobHandle = Arc<Mutex<BackupJob>>;

pub struct BackupOrchestrator {
    config: EngineConfig,
    provider: Arc<dyn ConfigProvider>,
    jobs: DashMap<String, JobHandle>,
    cache: ConfigCache,
    pool: ConnectionPool,
    dispatcher: PriorityDispatcher,
    cancels: CancelRegistry,
    next_seq: AtomicU64,
}

impl BackupOrchestrator {
    pub fn new(config: EngineConfig, provider: Arc<dyn ConfigProvider>) -> Self {
        let pool = ConnectionPool::new(
            config.pool_capacity,
            config.pool_acquire_timeout(),
            config.pool_release_timeout(),
        );
        let dispatcher = PriorityDispatcher::new(config.max_concurrent_jobs);
        Self {
            config,
            provider,
            jobs: DashMap::new(),
            cache: ConfigCache::new(),
            pool,
            dispatcher,
            cancels: CancelRegistry::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// The differential-backup cache, exposed for auditors and embedders.
    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    /// Register a new backup job. Never blocks and never touches the
    /// network; the artifact path is derived here so downstream tooling can
    /// rely on the naming convention.
    pub fn create_job(
        &self,
        device_address: &str,
        protocol_kind: &str,
        config_map: HashMap<String, String>,
    ) -> BackupJob {
        let protocol = protocol_kind.parse().unwrap_or_else(|_| {
            warn!(
                kind = protocol_kind,
                fallback = %self.config.default_protocol,
                "Unknown protocol kind, using fallback"
            );
            self.config.default_protocol
        });
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let created = Utc::now();
        let target_path = self.artifact_path(device_address, &config_map, created);
        let job = BackupJob::new(seq, device_address, protocol, target_path, config_map, created);
        info!(
            job_id = %job.job_id,
            device = device_address,
            protocol = %protocol,
            "Backup job created"
        );
        self.jobs
            .insert(job.job_id.clone(), Arc::new(Mutex::new(job.clone())));
        job
    }

    /// `<backup_root>/<sanitized-device-name>_<device-address>_<YYYYMMDD_HHMMSS>.cfg`
    fn artifact_path(
        &self,
        device_address: &str,
        config_map: &HashMap<String, String>,
        created: DateTime<Utc>,
    ) -> PathBuf {
        let name = config_map
            .get("device_name")
            .map(String::as_str)
            .unwrap_or("unknown");
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let stamp = created.format("%Y%m%d_%H%M%S");
        self.config
            .backup_root
            .join(format!("{sanitized}_{device_address}_{stamp}.cfg"))
    }

    /// Queue the job and run its pipeline once an admission slot frees up
    /// and it reaches the head of the queue.
    ///
    /// Returns `Yielded` without touching the job when another job is at
    /// the head (its own caller runs it); re-entrant starts of a job that
    /// is already executing or finished also yield. The only error is an
    /// unknown job id.
    pub async fn start_job(
        &self,
        job_id: &str,
        priority: i64,
        differential: bool,
    ) -> Result<StartOutcome> {
        let handle = self
            .jobs
            .get(job_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;

        let (seq, status) = {
            let job = handle.lock().await;
            (job.seq, job.status)
        };
        if status != JobStatus::Pending {
            debug!(job_id, ?status, "Ignoring start for a job that is not pending");
            return Ok(StartOutcome::Yielded);
        }

        self.dispatcher.enqueue(priority, seq, job_id).await;
        let permit = self.dispatcher.admit().await?;

        if !self.dispatcher.take_if_head(job_id).await {
            debug!(job_id, "Yielding admission slot, another job is at the head of the queue");
            return Ok(StartOutcome::Yielded);
        }

        {
            let mut job = handle.lock().await;
            if job.status != JobStatus::Pending {
                return Ok(StartOutcome::Yielded);
            }
            job.start();
        }
        let token = self.cancels.register(job_id);
        info!(job_id, priority, differential, "Backup job started");

        self.run_pipeline(&handle, differential, &token).await;

        self.cancels.complete(job_id);
        drop(permit);
        Ok(StartOutcome::Executed)
    }

    async fn run_pipeline(&self, handle: &JobHandle, differential: bool, cancel: &CancellationToken) {
        let (job_id, device, protocol, target_path) = {
            let job = handle.lock().await;
            (
                job.job_id.clone(),
                job.device_address.clone(),
                job.protocol,
                job.target_path.clone(),
            )
        };

        let mut transport = self.pool.acquire(protocol, &device).await;
        let clean = self
            .drive(handle, &mut transport, differential, cancel, &job_id, &device, &target_path)
            .await;

        // Cleanup is unconditional: a healthy session goes back to the
        // pool, anything else is torn down.
        if clean && transport.is_connected() {
            self.pool.release(transport, protocol, &device).await;
        } else if let Err(e) = transport.disconnect().await {
            debug!(job_id = %job_id, error = %e, "Error disconnecting transport");
        }
    }

    /// The attempt itself. Returns true when the job completed cleanly
    /// (including the no-changes skip).
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        handle: &JobHandle,
        transport: &mut Box<dyn Transport>,
        differential: bool,
        cancel: &CancellationToken,
        job_id: &str,
        device: &str,
        target_path: &Path,
    ) -> bool {
        if self.cancelled(handle, cancel).await {
            return false;
        }
        if let Err(e) = transport.connect().await {
            self.fail(handle, format!("Failed to connect to device: {e}")).await;
            return false;
        }

        self.set_phase(handle, "retrieving_config").await;
        if self.cancelled(handle, cancel).await {
            return false;
        }
        let snapshot = { handle.lock().await.clone() };
        let config_text = match self.provider.fetch_config(&snapshot).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                self.fail(handle, "Failed to retrieve device configuration").await;
                return false;
            }
            Err(e) => {
                warn!(job_id, error = %e, "Config fetch failed");
                self.fail(handle, "Failed to retrieve device configuration").await;
                return false;
            }
        };
        {
            let mut job = handle.lock().await;
            job.progress.total_bytes = config_text.len() as u64;
        }

        if differential {
            if let Some(cached) = self.cache.get(device) {
                self.set_phase(handle, "comparing_configs").await;
                if self.cancelled(handle, cancel).await {
                    return false;
                }
                match transport.config_diff(&cached, &config_text) {
                    Ok(diff) if !diff.has_changes => {
                        info!(job_id, device, "No configuration changes detected, skipping write");
                        let mut job = handle.lock().await;
                        job.result
                            .insert("differential".to_string(), serde_json::Value::Bool(true));
                        job.complete(true, "No configuration changes detected");
                        return true;
                    }
                    Ok(_) => {
                        debug!(job_id, device, "Configuration changed since last backup");
                    }
                    Err(e) => {
                        // Diff trouble is not worth losing a backup over.
                        warn!(job_id, error = %e, "Diff computation failed, falling back to full backup");
                    }
                }
            }
        }

        self.set_phase(handle, "validating_config").await;
        if self.cancelled(handle, cancel).await {
            return false;
        }
        match transport.validate_config(&config_text) {
            Ok(Validation::Accepted) => {}
            Ok(Validation::Rejected { reason }) => {
                self.fail(handle, format!("Configuration validation failed: {reason}")).await;
                return false;
            }
            Err(e) => {
                if self.config.strict_validation {
                    self.fail(handle, format!("Configuration validation failed: {e}")).await;
                    return false;
                }
                warn!(job_id, error = %e, "Validator errored, continuing without validation");
            }
        }

        self.set_phase(handle, "writing_backup").await;
        if self.cancelled(handle, cancel).await {
            return false;
        }
        match transport
            .upload_config(device, config_text.as_bytes(), target_path)
            .await
        {
            Ok(written) => {
                self.cache.store(device, &config_text);
                let mut job = handle.lock().await;
                job.progress.transferred_bytes = written;
                job.result.insert(
                    "artifact_path".to_string(),
                    serde_json::Value::String(target_path.display().to_string()),
                );
                job.result
                    .insert("bytes_written".to_string(), serde_json::Value::from(written));
                job.result.insert(
                    "size".to_string(),
                    serde_json::Value::String(format_bytes(written)),
                );
                job.complete(true, "Backup completed successfully");
                info!(
                    job_id,
                    device,
                    path = %target_path.display(),
                    size = %format_bytes(written),
                    "Backup job completed"
                );
                true
            }
            Err(e) => {
                self.fail(handle, format!("Failed to write backup file: {e}")).await;
                false
            }
        }
    }

    async fn cancelled(&self, handle: &JobHandle, cancel: &CancellationToken) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        let mut job = handle.lock().await;
        let job_id = job.job_id.clone();
        job.complete(false, "Backup cancelled");
        warn!(job_id = %job_id, "Backup job cancelled");
        true
    }

    async fn fail(&self, handle: &JobHandle, message: impl Into<String>) {
        let message = message.into();
        let mut job = handle.lock().await;
        job.complete(false, message.clone());
        error!(job_id = %job.job_id, error = %message, "Backup job failed");
    }

    async fn set_phase(&self, handle: &JobHandle, phase: &str) {
        handle.lock().await.set_phase(phase);
    }

    /// Trip an executing job's cancellation token. The pipeline aborts at
    /// its next phase boundary. Returns false when the job is not executing.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        let cancelled = self.cancels.cancel(job_id);
        if cancelled {
            info!(job_id, "Cancellation requested");
        }
        cancelled
    }

    /// Snapshot of one job, safe to call concurrently with its execution.
    pub async fn get_job_status(&self, job_id: &str) -> Option<BackupJob> {
        let handle = self.jobs.get(job_id).map(|e| e.value().clone())?;
        let job = handle.lock().await;
        Some(job.clone())
    }

    /// Snapshots of jobs that have not finished yet.
    pub async fn list_active_jobs(&self) -> Vec<BackupJob> {
        let handles: Vec<JobHandle> = self.jobs.iter().map(|e| e.value().clone()).collect();
        let mut active = Vec::new();
        for handle in handles {
            let job = handle.lock().await;
            if !job.status.is_finished() {
                active.push(job.clone());
            }
        }
        active
    }

    /// Snapshots of every registered job.
    pub async fn list_jobs(&self) -> Vec<BackupJob> {
        let handles: Vec<JobHandle> = self.jobs.iter().map(|e| e.value().clone()).collect();
        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            jobs.push(handle.lock().await.clone());
        }
        jobs
    }

    /// Apply the external auditor's verdict. Only Completed jobs move to
    /// Verified; returns whether the status changed.
    pub async fn verify_job(&self, job_id: &str, ok: bool) -> bool {
        let Some(handle) = self.jobs.get(job_id).map(|e| e.value().clone()) else {
            return false;
        };
        let mut job = handle.lock().await;
        let changed = job.verify(ok);
        if changed {
            info!(job_id, "Backup job verified");
        }
        changed
    }

    /// Retention sweep: drop finished jobs whose end time is older than the
    /// threshold. Jobs without an end time are never removed. Returns the
    /// number of jobs removed.
    pub async fn cleanup_completed(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let entries: Vec<(String, JobHandle)> = self
            .jobs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut removed = 0;
        for (job_id, handle) in entries {
            let expired = {
                let job = handle.lock().await;
                job.status.is_finished()
                    && job.progress.end_time.map(|t| t < cutoff).unwrap_or(false)
            };
            if expired && self.jobs.remove(&job_id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, max_age_hours, "Cleaned up finished backup jobs");
        }
        removed
    }
}
