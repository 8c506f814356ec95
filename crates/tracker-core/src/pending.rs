//! Pending-work resolution and stride partitioning
//!
//! Pending work is every registry ID without a successful result. IDs that
//! only failed before are retried; IDs already in the result table are never
//! re-run, whatever the error table says.
//!
//! The pending sequence is deterministic for identical inputs, so every CI
//! matrix job computes the same list and takes its own stride of it:
//! chunk `i` of `C` owns positions `i, i+C, i+2C, …`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Default upper bound on CI matrix width
pub const DEFAULT_MAX_CHUNKS: usize = 256;

/// Ordering of the pending sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingOrder {
    /// Registry order
    #[default]
    Registry,
    /// Never-attempted IDs first, then retries, each in registry order
    NeverRunFirst,
}

impl std::str::FromStr for PendingOrder {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry" => Ok(PendingOrder::Registry),
            "never-run-first" => Ok(PendingOrder::NeverRunFirst),
            other => Err(PartitionError::UnknownOrder(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("chunk count must be at least 1")]
    ZeroChunks,

    #[error("chunk index {index} is out of range for {count} chunks")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("max per job must be at least 1")]
    ZeroPerJob,

    #[error("unknown pending order '{0}' (expected 'registry' or 'never-run-first')")]
    UnknownOrder(String),
}

/// Compute the IDs that still need processing.
///
/// `registry` is taken in order and may contain duplicates; each ID is
/// returned at most once.
pub fn compute_pending<'a, I>(
    registry: I,
    succeeded: &HashSet<String>,
    failed: &HashSet<String>,
    order: PendingOrder,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let candidates: Vec<&str> = registry
        .into_iter()
        .filter(|id| !succeeded.contains(*id))
        .filter(|id| seen.insert(*id))
        .collect();

    match order {
        PendingOrder::Registry => candidates.into_iter().map(str::to_string).collect(),
        PendingOrder::NeverRunFirst => {
            let (retries, never_run): (Vec<&str>, Vec<&str>) =
                candidates.into_iter().partition(|id| failed.contains(*id));
            never_run
                .into_iter()
                .chain(retries)
                .map(str::to_string)
                .collect()
        },
    }
}

/// One worker's share of the pending sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    index: usize,
    count: usize,
}

impl ChunkSpec {
    pub fn new(index: usize, count: usize) -> Result<Self, PartitionError> {
        if count == 0 {
            return Err(PartitionError::ZeroChunks);
        }
        if index >= count {
            return Err(PartitionError::IndexOutOfRange { index, count });
        }
        Ok(Self { index, count })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Positions `index, index+count, …` of `items`, optionally capped
    pub fn slice<'a, T>(&self, items: &'a [T], max_per_job: Option<usize>) -> Vec<&'a T> {
        items
            .iter()
            .skip(self.index)
            .step_by(self.count)
            .take(max_per_job.unwrap_or(usize::MAX))
            .collect()
    }
}

impl std::fmt::Display for ChunkSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// How many matrix jobs to launch for one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixPlan {
    pub pending_count: usize,
    /// Items scheduled this trigger; the rest wait for the next one
    pub to_process: usize,
    pub chunk_count: usize,
}

impl MatrixPlan {
    /// Size the matrix for `pending_count` items.
    ///
    /// Without a per-job cap every pending item is scheduled over at most
    /// `max_chunks` jobs. With a cap only `max_chunks * max_per_job` items fit
    /// in one trigger and the job count shrinks to what those items need.
    pub fn new(
        pending_count: usize,
        max_chunks: usize,
        max_per_job: Option<usize>,
    ) -> Result<Self, PartitionError> {
        if max_chunks == 0 {
            return Err(PartitionError::ZeroChunks);
        }

        let (to_process, chunk_count) = match max_per_job {
            Some(0) => return Err(PartitionError::ZeroPerJob),
            Some(per_job) => {
                let to_process = max_chunks.saturating_mul(per_job).min(pending_count);
                (to_process, max_chunks.min(to_process.div_ceil(per_job)))
            },
            None => (pending_count, max_chunks.min(pending_count)),
        };

        Ok(Self {
            pending_count,
            to_process,
            chunk_count,
        })
    }

    pub fn deferred(&self) -> usize {
        self.pending_count - self.to_process
    }

    /// Chunk indices as a JSON array, e.g. `[0,1,2]`
    pub fn matrix_json(&self) -> String {
        let indices: Vec<usize> = (0..self.chunk_count).collect();
        serde_json::to_string(&indices).unwrap_or_else(|_| "[]".to_string())
    }
}
