//! Error types for the BUSCO tracker CLI
//!
//! Messages are user-facing. Usage errors exit with code 2, everything else
//! with 1.

use thiserror::Error;
use tracker_common::TrackerError;
use tracker_core::{CoreError, PartitionError};
use tracker_ingest::IngestError;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Arguments are inconsistent or out of range
    #[error("{0}. Run with --help for usage.")]
    Usage(String),

    /// Input tables or files could not be read
    #[error(transparent)]
    Input(#[from] TrackerError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Registry refresh or download failed
    #[error("Registry fetch failed: {0}. Check the API URL and your network connection.")]
    Ingest(#[from] IngestError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),
}

impl From<PartitionError> for CliError {
    fn from(e: PartitionError) -> Self {
        Self::Usage(e.to_string())
    }
}

impl CliError {
    /// Create a usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Core(e) if e.is_usage() => 2,
            _ => 1,
        }
    }
}
