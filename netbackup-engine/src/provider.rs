//! Collaborator interface for fetching device configurations.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::job::BackupJob;

/// Supplies the running configuration for the device a job targets.
///
/// Implementations live outside the engine (device inventory, terminal
/// session layer). The orchestrator treats an error or an empty payload as
/// a fetch failure, so implementations should fail fast rather than hang.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn fetch_config(&self, job: &BackupJob) -> anyhow::Result<String>;
}

/// Fixed device-address → configuration map. Handy for tests and for
/// embedding the engine against a pre-fetched inventory snapshot.
#[derive(Debug, Default)]
pub struct StaticConfigProvider {
    configs: HashMap<String, String>,
}

impl StaticConfigProvider {
    pub fn new(configs: HashMap<String, String>) -> Self {
        Self { configs }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn fetch_config(&self, job: &BackupJob) -> anyhow::Result<String> {
        self.configs
            .get(&job.device_address)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No configuration known for {}", job.device_address))
    }
}
