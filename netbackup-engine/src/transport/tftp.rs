//! TFTP transport.
//!
//! TFTP has no session handshake: connect and disconnect are successful
//! no-ops and uploads are always permitted.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{artifact_exists, check_payload, write_artifact, ProtocolKind, Transport};
use crate::utils::errors::Result;

/// Standard TFTP data block size, used for transfer accounting in logs.
const BLOCK_SIZE: usize = 512;

pub struct TftpTransport {
    server: String,
    session_id: Uuid,
}

impl TftpTransport {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            session_id: Uuid::new_v4(),
        }
    }
}

#[async_trait]
impl Transport for TftpTransport {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Tftp
    }

    fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn is_connected(&self) -> bool {
        // No session to hold; the transport is always ready.
        true
    }

    async fn connect(&mut self) -> Result<()> {
        trace!(session = %self.session_id, server = %self.server, "TFTP is connectionless, nothing to establish");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn upload_config(&mut self, device_address: &str, data: &[u8], target_path: &Path) -> Result<u64> {
        check_payload(device_address, data)?;
        let written = write_artifact(data, target_path).await?;
        debug!(
            session = %self.session_id,
            device = device_address,
            blocks = data.len().div_ceil(BLOCK_SIZE),
            "TFTP upload finished"
        );
        Ok(written)
    }

    async fn verify_backup(&self, target_path: &Path) -> Result<bool> {
        artifact_exists(target_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_without_connect_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sw1_10.0.0.1_20250101_000000.cfg");

        let mut transport = TftpTransport::new("10.0.0.1");
        let written = transport
            .upload_config("10.0.0.1", b"hostname sw1\n", &path)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hostname sw1\n");
        assert!(transport.verify_backup(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_payloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.cfg");
        let mut transport = TftpTransport::new("10.0.0.1");

        assert!(transport.upload_config("10.0.0.1", b"", &path).await.is_err());
        assert!(transport.upload_config("", b"hostname sw1\n", &path).await.is_err());
        assert!(transport
            .upload_config("10.0.0.1", &[0xff, 0x00, 0xfe], &path)
            .await
            .is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_verify_missing_artifact() {
        let dir = tempdir().unwrap();
        let transport = TftpTransport::new("10.0.0.1");
        let verified = transport
            .verify_backup(&dir.path().join("missing.cfg"))
            .await
            .unwrap();
        assert!(!verified);
    }
}
