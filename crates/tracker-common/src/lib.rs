//! BUSCO Tracker Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, table I/O, and error handling for the BUSCO tracker.
//!
//! # Overview
//!
//! This crate provides common functionality used across all workspace members:
//!
//! - **Error Handling**: [`TrackerError`] and the [`Result`] alias
//! - **Types**: annotation, result, and error records plus pipeline steps
//! - **Tables**: reading and writing the registry, result, and error TSVs and
//!   the per-item fragment files
//! - **I/O**: readers that transparently decompress gzip input
//!
//! # Example
//!
//! ```no_run
//! use tracker_common::tsv;
//!
//! fn count_done(path: &str) -> tracker_common::Result<usize> {
//!     let ids = tsv::load_ids(path)?;
//!     Ok(ids.len())
//! }
//! ```

pub mod error;
pub mod io;
pub mod logging;
pub mod tsv;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TrackerError};
pub use types::{AnnotationRecord, BuscoResult, ErrorRecord, Step};
