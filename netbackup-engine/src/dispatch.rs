//! Bounded-concurrency admission with priority ordering.
//!
//! A counting semaphore caps how many jobs run their network pipeline at
//! once; everyone else waits in a priority queue. Higher priority dispatches
//! first, equal priorities dispatch in creation order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::utils::errors::{EngineError, Result};

/// One waiting job. Higher priority wins; ties go to the lower creation
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEntry {
    priority: i64,
    seq: u64,
    job_id: String,
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct PendingQueue {
    heap: BinaryHeap<PendingEntry>,
    queued: HashSet<String>,
}

pub struct PriorityDispatcher {
    admission: Arc<Semaphore>,
    pending: Mutex<PendingQueue>,
}

impl PriorityDispatcher {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(max_concurrent)),
            pending: Mutex::new(PendingQueue::default()),
        }
    }

    /// Queue a job for dispatch. Re-queueing an already-pending job is a
    /// no-op, so retried start calls cannot duplicate heap entries.
    pub async fn enqueue(&self, priority: i64, seq: u64, job_id: &str) {
        let mut pending = self.pending.lock().await;
        if pending.queued.insert(job_id.to_string()) {
            pending.heap.push(PendingEntry {
                priority,
                seq,
                job_id: job_id.to_string(),
            });
        }
    }

    /// Block until an admission slot frees up.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        self.admission
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Dispatch(e.to_string()))
    }

    /// Claim the head of the queue if it is the given job. When another job
    /// is at the head the queue is left untouched and the caller must yield
    /// its slot.
    pub async fn take_if_head(&self, job_id: &str) -> bool {
        let mut pending = self.pending.lock().await;
        let is_head = pending
            .heap
            .peek()
            .map(|head| head.job_id == job_id)
            .unwrap_or(false);
        if is_head {
            if let Some(head) = pending.heap.pop() {
                pending.queued.remove(&head.job_id);
            }
        }
        is_head
    }

    /// Admission slots currently free.
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    /// Jobs currently waiting for dispatch.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.heap.len()
    }
}
