//! BUSCO Tracker Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Everything that talks to the outside world over HTTP:
//!
//! - **Registry refresh**: pull annotation records from the annotation API and
//!   append unseen ones to the registry TSV ([`registry`])
//! - **File acquisition**: download (or copy) an annotation or assembly,
//!   gunzipping on the way ([`download`])
//!
//! # Example
//!
//! ```no_run
//! use tracker_ingest::{download::Downloader, registry, HttpConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let downloader = Downloader::new(HttpConfig::default())?;
//!     let stats = registry::refresh_registry(
//!         &downloader,
//!         "https://annotations.example.org/api/annotations",
//!         "annotations.tsv",
//!     )
//!     .await?;
//!     println!("{} new annotations", stats.added);
//!     Ok(())
//! }
//! ```

pub mod download;
pub mod error;
pub mod registry;

pub use download::{Downloader, HttpConfig};
pub use error::{IngestError, Result};
