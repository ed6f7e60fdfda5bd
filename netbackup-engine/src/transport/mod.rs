//! Transport protocol contract and registry.
//!
//! Each backup attempt drives one transport instance through connect →
//! upload → verify. The wire protocols themselves are not implemented here;
//! the bundled variants carry the orchestration-visible semantics (session
//! bookkeeping, payload rejection, artifact persistence) against the local
//! filesystem sink.

pub mod diff;
mod ftp;
mod scp;
mod sftp;
mod tftp;

pub use diff::ConfigDiff;
pub use ftp::FtpTransport;
pub use scp::ScpTransport;
pub use sftp::SftpTransport;
pub use tftp::TftpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::utils::errors::{EngineError, Result};

/// Transport variant selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    Tftp,
    Scp,
    Sftp,
    Ftp,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Tftp => "tftp",
            ProtocolKind::Scp => "scp",
            ProtocolKind::Sftp => "sftp",
            ProtocolKind::Ftp => "ftp",
        }
    }
}

impl FromStr for ProtocolKind {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tftp" => Ok(ProtocolKind::Tftp),
            "scp" => Ok(ProtocolKind::Scp),
            "sftp" => Ok(ProtocolKind::Sftp),
            "ftp" => Ok(ProtocolKind::Ftp),
            other => Err(EngineError::Config(format!("Unknown protocol kind: {other}"))),
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a configuration content check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    Rejected { reason: String },
}

/// One logical session with a device, owned by a single backup attempt at a
/// time. Instances are reusable through the connection pool.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which protocol variant this transport speaks.
    fn kind(&self) -> ProtocolKind;

    /// Logical session identifier, for log correlation.
    fn session_id(&self) -> Uuid;

    /// Whether the transport currently holds a usable session.
    fn is_connected(&self) -> bool;

    /// Establish a logical session. Connectionless transports report success.
    async fn connect(&mut self) -> Result<()>;

    /// Tear the session down. Safe to call repeatedly.
    async fn disconnect(&mut self) -> Result<()>;

    /// Persist a retrieved configuration as the backup artifact.
    ///
    /// Empty payloads, non-textual payloads and a missing server address are
    /// rejected with an error; upload failures are expected operational
    /// outcomes, never panics. Returns the number of bytes written.
    async fn upload_config(&mut self, device_address: &str, data: &[u8], target_path: &Path) -> Result<u64>;

    /// Check that the artifact landed and is non-empty.
    async fn verify_backup(&self, target_path: &Path) -> Result<bool>;

    /// Content check applied before an artifact is written. Vendor-specific
    /// syntax checks go in transport overrides.
    fn validate_config(&self, data: &str) -> Result<Validation> {
        Ok(validate_text(data))
    }

    /// Diff two configuration texts. `has_changes` tracks byte equality.
    fn config_diff(&self, old: &str, new: &str) -> Result<ConfigDiff> {
        Ok(diff::line_diff(old, new))
    }
}

/// Build a fresh transport instance for the requested protocol kind.
pub fn create_transport(kind: ProtocolKind, server_address: &str) -> Box<dyn Transport> {
    match kind {
        ProtocolKind::Tftp => Box::new(TftpTransport::new(server_address)),
        ProtocolKind::Scp => Box::new(ScpTransport::new(server_address)),
        ProtocolKind::Sftp => Box::new(SftpTransport::new(server_address)),
        ProtocolKind::Ftp => Box::new(FtpTransport::new(server_address)),
    }
}

/// Shared content check: rejects empty and whitespace-only payloads.
pub fn validate_text(data: &str) -> Validation {
    if data.trim().is_empty() {
        Validation::Rejected {
            reason: "Configuration data is empty".to_string(),
        }
    } else {
        Validation::Accepted
    }
}

/// Pre-upload payload checks shared by every transport variant.
pub(crate) fn check_payload(device_address: &str, data: &[u8]) -> Result<()> {
    if device_address.trim().is_empty() {
        return Err(EngineError::UploadRejected("No server address".to_string()));
    }
    if data.is_empty() {
        return Err(EngineError::UploadRejected(
            "Empty configuration payload".to_string(),
        ));
    }
    if std::str::from_utf8(data).is_err() {
        return Err(EngineError::UploadRejected(
            "Configuration payload is not text".to_string(),
        ));
    }
    Ok(())
}

/// Write the artifact, creating the parent directory on first use.
pub(crate) async fn write_artifact(data: &[u8], target_path: &Path) -> Result<u64> {
    if let Some(parent) = target_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(target_path, data).await?;
    Ok(data.len() as u64)
}

/// True when the artifact exists and is non-empty.
pub(crate) async fn artifact_exists(target_path: &Path) -> Result<bool> {
    match tokio::fs::metadata(target_path).await {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
