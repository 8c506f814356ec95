//! `busco-tracker matrix` command implementation
//!
//! Emits `matrix`, `chunk_count` and `pending_count` as `key=value` lines,
//! appended to `$GITHUB_OUTPUT` when set and printed otherwise.

use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use tracker_common::tsv;
use tracker_core::{compute_pending, MatrixPlan, PendingOrder};

/// Append `lines` to the file named by `$GITHUB_OUTPUT`, or print them
fn write_outputs(lines: &[(&str, String)]) -> Result<()> {
    match std::env::var_os("GITHUB_OUTPUT") {
        Some(path) => {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            for (key, value) in lines {
                writeln!(file, "{key}={value}")?;
            }
        },
        None => {
            for (key, value) in lines {
                println!("{key}={value}");
            }
        },
    }
    Ok(())
}

/// Size the matrix for the current pending list
pub async fn run(
    registry: &Path,
    results: &Path,
    errors: &Path,
    max_chunks: usize,
    max_per_job: Option<usize>,
) -> Result<()> {
    let records = tsv::load_registry(registry)?;
    if records.is_empty() {
        warn!(path = %registry.display(), "Registry is empty, nothing to process");
    }

    let succeeded = tsv::load_ids(results)?;
    let failed = tsv::load_ids(errors)?;
    let pending = compute_pending(
        records.iter().map(|r| r.annotation_id.as_str()),
        &succeeded,
        &failed,
        PendingOrder::Registry,
    );

    let plan = MatrixPlan::new(pending.len(), max_chunks, max_per_job)?;
    let retries = pending.iter().filter(|id| failed.contains(*id)).count();

    info!(
        total = records.len(),
        succeeded = succeeded.len(),
        never_run = pending.len() - retries,
        retries,
        pending = plan.pending_count,
        this_trigger = plan.to_process,
        deferred = plan.deferred(),
        chunks = plan.chunk_count,
        "Matrix planned"
    );

    write_outputs(&[
        ("matrix", plan.matrix_json()),
        ("chunk_count", plan.chunk_count.to_string()),
        ("pending_count", plan.pending_count.to_string()),
    ])
}
