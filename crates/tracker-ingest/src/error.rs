//! Error types for HTTP ingestion

use reqwest::StatusCode;
use thiserror::Error;
use tracker_common::TrackerError;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Download error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] TrackerError),

    #[error("Input not found: {0}")]
    NotFound(String),

    #[error("Input is empty: {0}")]
    EmptyInput(String),

    #[error("Unsupported source '{0}' (expected an http(s) URL or a local path)")]
    UnsupportedSource(String),

    #[error("Unexpected API response: {0}")]
    Decode(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// True when the input itself is absent or empty, as opposed to a transfer failure
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            IngestError::NotFound(_)
                | IngestError::EmptyInput(_)
                | IngestError::Common(TrackerError::FileNotFound(_))
        )
    }

    /// True for transfer failures another attempt may fix. Client errors
    /// other than 408 and 429 are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Http(e) => match e.status() {
                Some(status) if status.is_client_error() => {
                    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
                },
                _ => true,
            },
            _ => false,
        }
    }
}
