//! BUSCO Tracker Core Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Completeness tracking for a registry of genome annotations.
//!
//! # Overview
//!
//! - **Isoform selection**: one longest protein per gene from a GFF3
//!   annotation and a protein FASTA ([`isoform`])
//! - **Pending work**: registry IDs without a result, split into CI matrix
//!   strides ([`pending`])
//! - **Pipeline**: fetch, reconcile, translate, select, run BUSCO, parse
//!   ([`pipeline`])
//! - **Batch worker**: one matrix job's share of the pending list ([`batch`])
//! - **Aggregation**: fold per-item fragments into the canonical tables
//!   ([`aggregate`])
//!
//! # Data flow
//!
//! ```text
//! registry.tsv ──► pending ──► chunk i/C ──► pipeline per ID ──► fragments/
//!                     ▲                                             │
//!        results.tsv ─┤                                             ▼
//!         errors.tsv ─┴──────────────────────────────────────── aggregate
//! ```
//!
//! Workers never touch the canonical tables; only the aggregator rewrites
//! them.
//!
//! # Example
//!
//! ```no_run
//! use tracker_core::{config::PipelineConfig, pipeline::Pipeline};
//! use tracker_common::AnnotationRecord;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::from_config(PipelineConfig::load()?)?;
//!     let record = AnnotationRecord::new("GCF_000001405.40", "annotation.gff3.gz", "genome.fna.gz");
//!     let outcome = pipeline.analyze(&record).await;
//!     outcome.write_fragment("fragments")?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod error;
pub mod isoform;
pub mod pending;
pub mod pipeline;

pub use aggregate::{aggregate, AggregateStats};
pub use batch::{run_batch, BatchRequest, BatchSummary};
pub use config::PipelineConfig;
pub use error::{CoreError, CoreResult};
pub use pending::{compute_pending, ChunkSpec, MatrixPlan, PartitionError, PendingOrder};
pub use pipeline::{Outcome, Pipeline, StepError};
