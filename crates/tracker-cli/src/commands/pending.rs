//! `busco-tracker pending` command implementation
//!
//! Prints pending annotation IDs, one per line.

use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tracker_common::tsv;
use tracker_core::{compute_pending, ChunkSpec, PendingOrder};

/// Print pending IDs, optionally only one worker's stride
pub async fn run(
    registry: &Path,
    results: &Path,
    errors: &Path,
    order: PendingOrder,
    chunk: Option<(usize, usize)>,
) -> Result<()> {
    let records = tsv::load_registry(registry)?;
    let succeeded = tsv::load_ids(results)?;
    let failed = tsv::load_ids(errors)?;

    let pending = compute_pending(
        records.iter().map(|r| r.annotation_id.as_str()),
        &succeeded,
        &failed,
        order,
    );

    let selected: Vec<&String> = match chunk {
        Some((index, count)) => ChunkSpec::new(index, count)?.slice(&pending, None),
        None => pending.iter().collect(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for id in selected {
        writeln!(out, "{id}")?;
    }
    out.flush()?;

    Ok(())
}
