//! `busco-tracker analyze` command implementation

use super::pipeline_config;
use crate::error::Result;
use crate::ToolArgs;
use std::path::Path;
use tracing::info;
use tracker_common::AnnotationRecord;
use tracker_core::{Outcome, Pipeline};

/// Assess one annotation and write its fragment into `output_dir`.
///
/// A failed assessment still succeeds here; the failure is in the fragment.
pub async fn run(
    annotation: &str,
    assembly: &str,
    annotation_id: &str,
    output_dir: &Path,
    tools: &ToolArgs,
) -> Result<()> {
    if annotation_id.trim().is_empty() {
        return Err(crate::CliError::usage("annotation ID cannot be empty"));
    }

    let pipeline = Pipeline::from_config(pipeline_config(tools)?)?;
    let record = AnnotationRecord::new(annotation_id, annotation, assembly);

    let outcome = pipeline.analyze(&record).await;
    std::fs::create_dir_all(output_dir)?;
    let path = outcome.write_fragment(output_dir)?;

    match outcome {
        Outcome::Success(ref result) => println!(
            "{}\t{}\tC:{}%\t{}",
            result.annotation_id,
            result.lineage,
            result.complete,
            path.display()
        ),
        Outcome::Failure(ref error) => println!(
            "{}\tfailed at {}\t{}",
            error.annotation_id,
            error.step,
            path.display()
        ),
    }
    info!(fragment = %path.display(), "Fragment written");

    Ok(())
}
