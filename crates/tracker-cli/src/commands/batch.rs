//! `busco-tracker batch` command implementation
//!
//! Runs one CI matrix job. Per-annotation failures end up in error
//! fragments, so this only fails when setup does.

use super::pipeline_config;
use crate::error::Result;
use crate::ToolArgs;
use colored::Colorize;
use std::path::PathBuf;
use tracker_core::{run_batch, BatchRequest, ChunkSpec, PendingOrder, Pipeline};

/// Arguments for one worker
#[derive(Debug, Clone)]
pub struct BatchArgs {
    pub registry: PathBuf,
    pub results: PathBuf,
    pub errors: PathBuf,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub output_dir: PathBuf,
    pub max_per_job: Option<usize>,
    pub order: PendingOrder,
}

/// Process this worker's stride
pub async fn run(args: BatchArgs, tools: &ToolArgs) -> Result<()> {
    let chunk = ChunkSpec::new(args.chunk_index, args.chunk_count)?;
    if args.max_per_job == Some(0) {
        return Err(crate::CliError::usage("max-per-job must be at least 1"));
    }

    let pipeline = Pipeline::from_config(pipeline_config(tools)?)?;
    let request = BatchRequest {
        registry: args.registry,
        results: args.results,
        errors: args.errors,
        chunk,
        output_dir: args.output_dir,
        max_per_job: args.max_per_job,
        order: args.order,
    };

    let summary = run_batch(&pipeline, &request).await?;

    println!("{}", format!("Batch {chunk} finished").cyan().bold());
    println!("  Pending (all jobs): {}", summary.pending_total);
    println!("  Assigned:           {}", summary.assigned);
    println!("  Succeeded:          {}", summary.succeeded.to_string().green());
    println!("  Failed:             {}", summary.failed.to_string().yellow());
    println!("  Fragments:          {}", request.output_dir.display());

    Ok(())
}
