//! Custom error types for the backup engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
