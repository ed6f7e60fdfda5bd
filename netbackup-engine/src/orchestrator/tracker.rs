//! Per-job cancellation registry.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Hands out cancellation tokens for executing jobs and lets callers trip
/// them by job id. The pipeline polls its token at phase boundaries.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    tokens: DashMap<String, CancellationToken>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    /// Register a token for a job about to execute.
    pub fn register(&self, job_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.insert(job_id.to_string(), token.clone());
        token
    }

    /// Trip an executing job's token. Returns false when the job is not
    /// executing.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.tokens.get(job_id) {
            Some(entry) => {
                entry.value().cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the token once the job reaches a terminal state.
    pub fn complete(&self, job_id: &str) {
        self.tokens.remove(job_id);
    }

    /// Jobs currently executing a pipeline.
    pub fn executing_count(&self) -> usize {
        self.tokens.len()
    }
}
