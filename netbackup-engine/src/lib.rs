//! Backup job orchestration engine for network device configurations.
//!
//! Accepts a request to back up one device's configuration, schedules it
//! against a bounded pool of concurrent workers, drives a transport
//! protocol to retrieve and persist the configuration, decides whether a
//! differential (change-only) write is needed, and tracks the job to a
//! terminal state with structured failure information.
//!
//! The engine is a library: device inventory, schedule-time calculation
//! and durable job history live in the calling layer, behind the
//! [`provider::ConfigProvider`] collaborator trait and the job snapshots
//! returned from [`orchestrator::BackupOrchestrator`].

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod job;
pub mod orchestrator;
pub mod pool;
pub mod provider;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use cache::ConfigCache;
pub use config::EngineConfig;
pub use job::{BackupJob, JobStatus};
pub use orchestrator::{BackupOrchestrator, StartOutcome};
pub use provider::ConfigProvider;
pub use transport::{ProtocolKind, Transport};
pub use utils::errors::EngineError;
pub type Result<T> = std::result::Result<T, EngineError>;
