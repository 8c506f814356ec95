//! Error types for batch-level operations
//!
//! Per-item failures never surface here: the pipeline turns them into error
//! records. These variants abort a whole invocation.

use crate::pending::PartitionError;
use std::path::PathBuf;
use thiserror::Error;
use tracker_common::TrackerError;
use tracker_ingest::IngestError;

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Invalid partition: {0}")]
    Partition(#[from] PartitionError),

    #[error("Fragment directory not found: {}", .0.display())]
    MissingFragmentDir(PathBuf),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// True when the caller passed bad arguments rather than hitting bad data
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            CoreError::Partition(_) | CoreError::MissingFragmentDir(_) | CoreError::Config(_)
        )
    }
}
