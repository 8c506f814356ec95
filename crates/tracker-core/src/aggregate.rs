//! Fragment aggregation
//!
//! Workers leave `result_<id>.tsv` and `log_<id>.tsv` fragments behind. The
//! aggregator folds them into the canonical result and error tables:
//!
//! - results are upserted by `annotation_id`; fragments are visited in sorted
//!   path order and the last row for an ID wins
//! - errors are keyed by `(annotation_id, run_at)`; the first row for a key is
//!   kept, so replaying the same fragments adds nothing
//!
//! Both tables are rewritten sorted by key, so aggregating the same inputs
//! twice yields byte-identical files.

use crate::error::{CoreError, CoreResult};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracker_common::tsv::{self, FragmentKind};
use tracker_common::{BuscoResult, ErrorRecord};
use walkdir::WalkDir;

/// Counters from one aggregation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub fragments_read: usize,
    pub fragments_skipped: usize,
    /// Result rows inserted or replaced
    pub results_upserted: usize,
    /// Error rows with a new `(annotation_id, run_at)`
    pub errors_appended: usize,
    pub result_rows: usize,
    pub error_rows: usize,
}

/// Fragment files under `dir`, in sorted path order
fn fragment_paths(dir: &Path, stats: &mut AggregateStats) -> Vec<(FragmentKind, PathBuf)> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable fragment path");
                stats.fragments_skipped += 1;
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = FragmentKind::from_file_name(&entry.file_name().to_string_lossy()) {
            paths.push((kind, entry.into_path()));
        }
    }

    paths.sort_by(|a, b| a.1.cmp(&b.1));
    paths
}

/// Merge every fragment under `fragments_dir` into the two tables
pub fn aggregate(
    fragments_dir: impl AsRef<Path>,
    results_path: impl AsRef<Path>,
    errors_path: impl AsRef<Path>,
) -> CoreResult<AggregateStats> {
    let fragments_dir = fragments_dir.as_ref();
    let results_path = results_path.as_ref();
    let errors_path = errors_path.as_ref();

    if !fragments_dir.is_dir() {
        return Err(CoreError::MissingFragmentDir(fragments_dir.to_path_buf()));
    }

    let mut results: BTreeMap<String, BuscoResult> = tsv::read_result_table(results_path)?
        .into_iter()
        .map(|r| (r.annotation_id.clone(), r))
        .collect();

    let mut errors: BTreeMap<(String, String), ErrorRecord> = BTreeMap::new();
    for record in tsv::read_error_table(errors_path)? {
        errors.entry(record.key()).or_insert(record);
    }

    let mut stats = AggregateStats::default();

    for (kind, path) in fragment_paths(fragments_dir, &mut stats) {
        match kind {
            FragmentKind::Result => match tsv::read_result_fragment(&path) {
                Ok(rows) => {
                    stats.fragments_read += 1;
                    for row in rows {
                        stats.results_upserted += 1;
                        results.insert(row.annotation_id.clone(), row);
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed result fragment");
                    stats.fragments_skipped += 1;
                },
            },
            FragmentKind::Error => match tsv::read_error_fragment(&path) {
                Ok(rows) => {
                    stats.fragments_read += 1;
                    for row in rows {
                        if let Entry::Vacant(slot) = errors.entry(row.key()) {
                            slot.insert(row);
                            stats.errors_appended += 1;
                        }
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed error fragment");
                    stats.fragments_skipped += 1;
                },
            },
        }
        debug!(path = %path.display(), "Merged fragment");
    }

    stats.result_rows = results.len();
    stats.error_rows = errors.len();

    tsv::write_result_table(results_path, results.values())?;
    tsv::write_error_table(errors_path, errors.values())?;

    info!(
        fragments_read = stats.fragments_read,
        fragments_skipped = stats.fragments_skipped,
        results_upserted = stats.results_upserted,
        errors_appended = stats.errors_appended,
        result_rows = stats.result_rows,
        error_rows = stats.error_rows,
        "Aggregation complete"
    );

    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn result(id: &str, complete: f64) -> BuscoResult {
        BuscoResult {
            annotation_id: id.to_string(),
            lineage: "eukaryota_odb12".to_string(),
            busco_count: 129,
            complete,
            single: complete,
            duplicated: 0.0,
            fragmented: 0.0,
            missing: 100.0 - complete,
        }
    }

    #[test]
    fn test_missing_fragment_dir_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = aggregate(
            dir.path().join("nope"),
            dir.path().join("r.tsv"),
            dir.path().join("e.tsv"),
        )
        .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_later_fragment_wins_for_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let frags = dir.path().join("frags");
        tsv::write_result_fragment(frags.join("a"), &result("g1", 90.0)).unwrap();
        tsv::write_result_fragment(frags.join("b"), &result("g1", 95.0)).unwrap();

        let results_path = dir.path().join("results.tsv");
        let stats = aggregate(&frags, &results_path, dir.path().join("errors.tsv")).unwrap();

        assert_eq!(stats.results_upserted, 2);
        assert_eq!(stats.result_rows, 1);
        assert_eq!(tsv::read_result_table(&results_path).unwrap()[0].complete, 95.0);
    }

    #[test]
    fn test_malformed_fragment_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let frags = dir.path().join("frags");
        std::fs::create_dir_all(&frags).unwrap();
        std::fs::write(frags.join("result_bad.tsv"), "g9\teukaryota_odb12\tmany\n").unwrap();
        std::fs::write(frags.join("log_bad.tsv"), "only-one-column\n").unwrap();
        std::fs::write(frags.join("README.md"), "ignored").unwrap();
        tsv::write_error_fragment(&frags, &ErrorRecord::new("g2", "2025-01-01 00:00:00", "run_busco"))
            .unwrap();

        let stats = aggregate(&frags, dir.path().join("r.tsv"), dir.path().join("e.tsv")).unwrap();

        assert_eq!(stats.fragments_read, 1);
        assert_eq!(stats.fragments_skipped, 2);
        assert_eq!(stats.errors_appended, 1);
        assert_eq!(stats.result_rows, 0);
    }

    #[test]
    fn test_malformed_canonical_table_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let frags = dir.path().join("frags");
        std::fs::create_dir_all(&frags).unwrap();
        let results_path = dir.path().join("results.tsv");
        std::fs::write(&results_path, "g1\tbroken\n").unwrap();

        assert!(aggregate(&frags, &results_path, dir.path().join("e.tsv")).is_err());
        assert_eq!(std::fs::read_to_string(&results_path).unwrap(), "g1\tbroken\n");
    }
}
