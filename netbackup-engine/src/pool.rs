//! Reusable transport connection pool.
//!
//! Idle transport instances are kept per (protocol, device) key so repeated
//! backups of the same device can reuse a session. Every pool operation is
//! bounded by a short timeout; the pool never blocks a job indefinitely and
//! never propagates an error to the caller.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::transport::{self, ProtocolKind, Transport};

type PoolKey = (ProtocolKind, String);
type Slot = Arc<Mutex<VecDeque<Box<dyn Transport>>>>;

pub struct ConnectionPool {
    slots: DashMap<PoolKey, Slot>,
    capacity: usize,
    acquire_timeout: Duration,
    release_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(capacity: usize, acquire_timeout: Duration, release_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            capacity,
            acquire_timeout,
            release_timeout,
        }
    }

    fn slot(&self, kind: ProtocolKind, device_address: &str) -> Slot {
        self.slots
            .entry((kind, device_address.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    /// Pop an idle transport for the key, or build a fresh one. Waits at
    /// most the acquire timeout; never fails.
    pub async fn acquire(&self, kind: ProtocolKind, device_address: &str) -> Box<dyn Transport> {
        let slot = self.slot(kind, device_address);
        match timeout(self.acquire_timeout, slot.lock()).await {
            Ok(mut queue) => {
                if let Some(t) = queue.pop_front() {
                    debug!(
                        protocol = %kind,
                        device = device_address,
                        session = %t.session_id(),
                        "Reusing pooled transport"
                    );
                    return t;
                }
            }
            Err(_) => {
                warn!(
                    protocol = %kind,
                    device = device_address,
                    "Timed out waiting for the connection pool, building a fresh transport"
                );
            }
        }
        transport::create_transport(kind, device_address)
    }

    /// Return a transport to the pool. On a full queue or a slow pool the
    /// instance is disconnected and dropped; errors never reach the caller.
    pub async fn release(
        &self,
        mut t: Box<dyn Transport>,
        kind: ProtocolKind,
        device_address: &str,
    ) {
        let slot = self.slot(kind, device_address);
        match timeout(self.release_timeout, slot.lock()).await {
            Ok(mut queue) if queue.len() < self.capacity => {
                queue.push_back(t);
                return;
            }
            Ok(_) => {
                debug!(protocol = %kind, device = device_address, "Pool full, discarding transport");
            }
            Err(_) => {
                warn!(
                    protocol = %kind,
                    device = device_address,
                    "Timed out returning transport to the pool, discarding"
                );
            }
        }
        if let Err(e) = t.disconnect().await {
            debug!(error = %e, "Error disconnecting discarded transport");
        }
    }

    /// Idle instances currently held for the key.
    pub async fn idle_count(&self, kind: ProtocolKind, device_address: &str) -> usize {
        let slot = self
            .slots
            .get(&(kind, device_address.to_string()))
            .map(|e| e.value().clone());
        match slot {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ConnectionPool {
        ConnectionPool::new(2, Duration::from_millis(500), Duration::from_millis(1000))
    }

    #[tokio::test]
    async fn test_acquire_on_empty_pool_builds_fresh() {
        let pool = pool();
        let t = pool.acquire(ProtocolKind::Scp, "10.0.0.1").await;
        assert_eq!(t.kind(), ProtocolKind::Scp);
        assert!(!t.is_connected());
        assert_eq!(pool.idle_count(ProtocolKind::Scp, "10.0.0.1").await, 0);
    }

    #[tokio::test]
    async fn test_release_then_acquire_reuses_instance() {
        let pool = pool();
        let t = pool.acquire(ProtocolKind::Tftp, "10.0.0.1").await;
        let session = t.session_id();

        pool.release(t, ProtocolKind::Tftp, "10.0.0.1").await;
        assert_eq!(pool.idle_count(ProtocolKind::Tftp, "10.0.0.1").await, 1);

        let t2 = pool.acquire(ProtocolKind::Tftp, "10.0.0.1").await;
        assert_eq!(t2.session_id(), session);
    }

    #[tokio::test]
    async fn test_release_beyond_capacity_discards() {
        let pool = pool();
        let a = transport::create_transport(ProtocolKind::Ftp, "10.0.0.1");
        let b = transport::create_transport(ProtocolKind::Ftp, "10.0.0.1");
        let c = transport::create_transport(ProtocolKind::Ftp, "10.0.0.1");
        pool.release(a, ProtocolKind::Ftp, "10.0.0.1").await;
        pool.release(b, ProtocolKind::Ftp, "10.0.0.1").await;
        pool.release(c, ProtocolKind::Ftp, "10.0.0.1").await;
        assert_eq!(pool.idle_count(ProtocolKind::Ftp, "10.0.0.1").await, 2);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let pool = pool();
        let t = pool.acquire(ProtocolKind::Tftp, "10.0.0.1").await;
        pool.release(t, ProtocolKind::Tftp, "10.0.0.1").await;

        assert_eq!(pool.idle_count(ProtocolKind::Tftp, "10.0.0.2").await, 0);
        assert_eq!(pool.idle_count(ProtocolKind::Scp, "10.0.0.1").await, 0);
    }
}
