//! FTP transport.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::{artifact_exists, check_payload, write_artifact, ProtocolKind, Transport};
use crate::utils::errors::{EngineError, Result};

pub struct FtpTransport {
    server: String,
    /// Passive mode is the only sensible default behind NAT.
    passive: bool,
    session_id: Uuid,
    connected: bool,
}

impl FtpTransport {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            passive: true,
            session_id: Uuid::new_v4(),
            connected: false,
        }
    }
}

#[async_trait]
impl Transport for FtpTransport {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ftp
    }

    fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(EngineError::Transport(
                "No server address configured".to_string(),
            ));
        }
        self.connected = true;
        debug!(
            session = %self.session_id,
            server = %self.server,
            passive = self.passive,
            "FTP control connection opened"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            debug!(session = %self.session_id, server = %self.server, "FTP control connection closed");
        }
        Ok(())
    }

    async fn upload_config(&mut self, device_address: &str, data: &[u8], target_path: &Path) -> Result<u64> {
        if !self.connected {
            return Err(EngineError::Transport(
                "FTP control connection not established".to_string(),
            ));
        }
        check_payload(device_address, data)?;
        let written = write_artifact(data, target_path).await?;
        debug!(session = %self.session_id, device = device_address, bytes = written, "FTP upload finished");
        Ok(written)
    }

    async fn verify_backup(&self, target_path: &Path) -> Result<bool> {
        artifact_exists(target_path).await
    }
}
