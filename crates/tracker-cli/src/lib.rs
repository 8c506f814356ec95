//! BUSCO Tracker CLI Library
//!
//! Command-line entry points for the annotation completeness tracker.
//!
//! # Overview
//!
//! - **Selection**: longest isoform per gene (`busco-tracker select`)
//! - **Scheduling**: pending IDs and CI matrix sizing (`busco-tracker pending`,
//!   `busco-tracker matrix`)
//! - **Processing**: one matrix job, or one annotation (`busco-tracker batch`,
//!   `busco-tracker analyze`)
//! - **Aggregation**: fold fragments into the tables (`busco-tracker aggregate`)
//! - **Registry**: pull new annotations from the API (`busco-tracker fetch`)

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracker_core::pending::DEFAULT_MAX_CHUNKS;
use tracker_core::{PendingOrder, PipelineConfig};

/// BUSCO Tracker - annotation completeness bookkeeping
#[derive(Parser, Debug)]
#[command(name = "busco-tracker")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Keep the longest protein isoform of every gene
    Select {
        /// GFF3 annotation (plain or gzip)
        annotation: PathBuf,

        /// Protein FASTA keyed by transcript ID (plain or gzip)
        proteins: PathBuf,

        /// Write FASTA here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print annotation IDs that still need processing
    Pending {
        /// Registry TSV
        registry: PathBuf,

        /// Result table
        results: PathBuf,

        /// Error table
        errors: PathBuf,

        /// Pending order: registry or never-run-first
        #[arg(long, default_value = "registry")]
        order: PendingOrder,

        /// Only print this worker's stride (requires --chunk-count)
        #[arg(long, requires = "chunk_count")]
        chunk_index: Option<usize>,

        /// Number of workers sharing the pending list
        #[arg(long, requires = "chunk_index")]
        chunk_count: Option<usize>,
    },

    /// Size the CI job matrix
    Matrix {
        /// Registry TSV
        registry: PathBuf,

        /// Result table
        results: PathBuf,

        /// Error table
        errors: PathBuf,

        /// Upper bound on matrix width
        #[arg(long, default_value_t = DEFAULT_MAX_CHUNKS)]
        max_chunks: usize,

        /// Annotations per job; limits how many run this trigger
        #[arg(long)]
        max_per_job: Option<usize>,
    },

    /// Process one worker's stride of the pending annotations
    Batch {
        /// Registry TSV
        registry: PathBuf,

        /// Result table
        results: PathBuf,

        /// Error table
        errors: PathBuf,

        /// This worker's index, from 0
        chunk_index: usize,

        /// Total number of workers
        chunk_count: usize,

        /// Directory for this worker's fragments
        output_dir: PathBuf,

        /// Stop after this many annotations
        max_per_job: Option<usize>,

        /// Pending order: registry or never-run-first
        #[arg(long, default_value = "registry")]
        order: PendingOrder,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Assess a single annotation and write its fragment
    Analyze {
        /// GFF3 annotation URL or path
        annotation: String,

        /// Assembly FASTA URL or path
        assembly: String,

        /// Annotation identifier recorded in the fragment
        annotation_id: String,

        /// Directory for the fragment
        output_dir: PathBuf,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Merge fragments into the result and error tables
    Aggregate {
        /// Directory searched recursively for fragments
        fragments_dir: PathBuf,

        /// Result table, rewritten in place
        results: PathBuf,

        /// Error table, rewritten in place
        errors: PathBuf,
    },

    /// Append new annotations from the annotation API to the registry
    Fetch {
        /// Registry TSV, created when missing
        registry: PathBuf,

        /// Annotation API endpoint
        #[arg(long, env = "TRACKER_API_URL")]
        api_url: Option<String>,
    },
}

/// Overrides for tool and workspace settings
#[derive(Args, Debug, Clone, Default)]
pub struct ToolArgs {
    /// Command used to run BUSCO
    #[arg(long)]
    pub busco_command: Option<String>,

    /// Command used to run gffread
    #[arg(long)]
    pub gffread_command: Option<String>,

    /// Pre-downloaded lineage dataset directory
    #[arg(long)]
    pub lineage_path: Option<PathBuf>,

    /// BUSCO threads
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Parent directory for per-annotation scratch space
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Keep scratch directories after each annotation
    #[arg(long)]
    pub keep_work_dir: bool,
}

impl ToolArgs {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(ref command) = self.busco_command {
            config.tools.busco_command = command.clone();
        }
        if let Some(ref command) = self.gffread_command {
            config.tools.gffread_command = command.clone();
        }
        if let Some(ref path) = self.lineage_path {
            config.busco.lineage_path = path.clone();
        }
        if let Some(cpu) = self.cpu {
            config.busco.cpu = cpu;
        }
        if let Some(ref dir) = self.work_dir {
            config.work.work_dir = dir.clone();
        }
        if self.keep_work_dir {
            config.work.keep_work_dir = true;
        }
    }
}
