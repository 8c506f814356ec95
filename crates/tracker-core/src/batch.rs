//! Batch worker
//!
//! One CI matrix job: resolve the pending list, take this job's stride, and
//! run the pipeline over it one annotation at a time. Every item leaves
//! exactly one fragment in the output directory before the next one starts.
//! Item failures are data, not errors: once setup succeeds the batch
//! succeeds.

use crate::error::CoreResult;
use crate::pending::{compute_pending, ChunkSpec, PendingOrder};
use crate::pipeline::tools::ToolRunner;
use crate::pipeline::{Outcome, Pipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracker_common::{tsv, AnnotationRecord, ErrorRecord, Step};

/// Inputs for one worker
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub registry: PathBuf,
    pub results: PathBuf,
    pub errors: PathBuf,
    pub chunk: ChunkSpec,
    pub output_dir: PathBuf,
    pub max_per_job: Option<usize>,
    pub order: PendingOrder,
}

/// What a worker did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Pending items across all workers
    pub pending_total: usize,
    /// Items in this worker's slice
    pub assigned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub fragments: Vec<PathBuf>,
}

/// Resolve this worker's slice of pending annotations, in processing order
pub fn assigned_records(request: &BatchRequest) -> CoreResult<(usize, Vec<AnnotationRecord>)> {
    let registry = tsv::load_registry(&request.registry)?;
    let succeeded = tsv::load_ids(&request.results)?;
    let failed = tsv::load_ids(&request.errors)?;

    let pending = compute_pending(
        registry.iter().map(|r| r.annotation_id.as_str()),
        &succeeded,
        &failed,
        request.order,
    );

    let by_id: HashMap<&str, &AnnotationRecord> =
        registry.iter().map(|r| (r.annotation_id.as_str(), r)).collect();
    let assigned = request
        .chunk
        .slice(&pending, request.max_per_job)
        .into_iter()
        .filter_map(|id| by_id.get(id.as_str()).map(|r| (*r).clone()))
        .collect();

    Ok((pending.len(), assigned))
}

/// Run one worker to completion.
///
/// Errors only when setup fails (unreadable registry or tables, output
/// directory not creatable).
pub async fn run_batch<R: ToolRunner>(pipeline: &Pipeline<R>, request: &BatchRequest) -> CoreResult<BatchSummary> {
    let (pending_total, records) = assigned_records(request)?;
    std::fs::create_dir_all(&request.output_dir)?;

    info!(
        chunk = %request.chunk,
        pending_total,
        assigned = records.len(),
        output_dir = %request.output_dir.display(),
        "Starting batch"
    );

    let started = Instant::now();
    let mut summary = BatchSummary {
        pending_total,
        assigned: records.len(),
        ..BatchSummary::default()
    };

    for (position, record) in records.iter().enumerate() {
        info!(
            annotation_id = %record.annotation_id,
            item = position + 1,
            of = records.len(),
            "Processing"
        );

        let outcome = pipeline.analyze(record).await;
        let outcome = match outcome.write_fragment(&request.output_dir) {
            Ok(path) => {
                summary.fragments.push(path);
                outcome
            },
            Err(e) => {
                error!(annotation_id = %record.annotation_id, error = %e, "Failed to write fragment");
                let fallback = Outcome::Failure(ErrorRecord::now(&record.annotation_id, Step::UnexpectedError));
                match fallback.write_fragment(&request.output_dir) {
                    Ok(path) => summary.fragments.push(path),
                    Err(e) => warn!(annotation_id = %record.annotation_id, error = %e, "No fragment recorded"),
                }
                fallback
            },
        };

        if outcome.is_success() {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
    }

    info!(
        chunk = %request.chunk,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_secs = started.elapsed().as_secs(),
        "Batch finished"
    );

    Ok(summary)
}
