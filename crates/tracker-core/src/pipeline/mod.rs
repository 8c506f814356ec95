//! Per-annotation assessment pipeline
//!
//! Each annotation runs through a fixed sequence of steps inside a private
//! work directory:
//!
//! 1. fetch the annotation and assembly
//! 2. reconcile sequence IDs between them
//! 3. translate transcripts to proteins with gffread
//! 4. keep the longest isoform per gene
//! 5. run BUSCO offline in protein mode
//! 6. read the short summary
//!
//! The first failing step ends the item and is recorded in an
//! [`ErrorRecord`]. [`Pipeline::analyze`] never returns an error.

pub mod normalize;
pub mod summary;
pub mod tools;

use crate::config::PipelineConfig;
use crate::error::{CoreError, CoreResult};
use crate::isoform::select_longest_isoforms;
use anyhow::Context;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tools::{CommandSpec, ProcessRunner, ToolOutput, ToolRunner};
use tracing::{debug, info, warn};
use tracker_common::tsv::{self, safe_file_stem};
use tracker_common::{AnnotationRecord, BuscoResult, ErrorRecord, Step};
use tracker_ingest::Downloader;

/// Directory name BUSCO writes into, below the work directory
const BUSCO_OUT_NAME: &str = "busco_out";

// ============================================================================
// Step errors
// ============================================================================

/// A failure attributed to one pipeline step
#[derive(Debug)]
pub struct StepError {
    step: Step,
    source: anyhow::Error,
}

impl StepError {
    pub fn new(step: Step, source: impl Into<anyhow::Error>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }

    pub fn msg(step: Step, message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(step, anyhow::Error::msg(message))
    }

    pub fn step(&self) -> Step {
        self.step
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.step, self.source)
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Attach a [`Step`] to any error
pub trait StepExt<T> {
    fn step(self, step: Step) -> Result<T, StepError>;
}

impl<T, E: Into<anyhow::Error>> StepExt<T> for Result<T, E> {
    fn step(self, step: Step) -> Result<T, StepError> {
        self.map_err(|e| StepError::new(step, e))
    }
}

/// Run file-heavy work off the async runtime
async fn blocking<T, F>(step: Step, work: F) -> Result<T, StepError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.step(step),
        Err(join) => Err(StepError::new(Step::UnexpectedError, join)),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Outcome
// ============================================================================

/// What one annotation produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(BuscoResult),
    Failure(ErrorRecord),
}

impl Outcome {
    pub fn annotation_id(&self) -> &str {
        match self {
            Outcome::Success(result) => &result.annotation_id,
            Outcome::Failure(error) => &error.annotation_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Write the single fragment file for this outcome into `dir`
    pub fn write_fragment(&self, dir: impl AsRef<Path>) -> tracker_common::Result<PathBuf> {
        match self {
            Outcome::Success(result) => tsv::write_result_fragment(dir, result),
            Outcome::Failure(error) => tsv::write_error_fragment(dir, error),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs the assessment steps for one annotation at a time
pub struct Pipeline<R = ProcessRunner> {
    config: PipelineConfig,
    downloader: Downloader,
    runner: R,
    gffread: CommandSpec,
    busco: CommandSpec,
}

impl Pipeline<ProcessRunner> {
    /// Pipeline that runs the configured tools as child processes
    pub fn from_config(config: PipelineConfig) -> CoreResult<Self> {
        Self::new(config, ProcessRunner)
    }
}

impl<R: ToolRunner> Pipeline<R> {
    pub fn new(config: PipelineConfig, runner: R) -> CoreResult<Self> {
        let gffread = CommandSpec::parse(&config.tools.gffread_command)
            .ok_or_else(|| CoreError::Config("gffread command cannot be empty".to_string()))?;
        let busco = CommandSpec::parse(&config.tools.busco_command)
            .ok_or_else(|| CoreError::Config("BUSCO command cannot be empty".to_string()))?;
        let downloader = Downloader::new(config.http_config())?;

        Ok(Self {
            config,
            downloader,
            runner,
            gffread,
            busco,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Work directory used for `annotation_id`
    pub fn work_dir_for(&self, annotation_id: &str) -> PathBuf {
        self.config.work.work_dir.join(safe_file_stem(annotation_id))
    }

    /// Assess one annotation; failures come back as [`Outcome::Failure`]
    pub async fn analyze(&self, record: &AnnotationRecord) -> Outcome {
        let id = record.annotation_id.as_str();
        let work = self.work_dir_for(id);
        let started = Instant::now();

        info!(annotation_id = %id, "Analyzing annotation");
        let result = self.run(record, &work).await;

        if !self.config.work.keep_work_dir {
            match tokio::fs::remove_dir_all(&work).await {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => warn!(path = %work.display(), error = %e, "Failed to remove work directory"),
            }
        }

        let elapsed_secs = started.elapsed().as_secs();
        match result {
            Ok(result) => {
                info!(
                    annotation_id = %id,
                    complete = result.complete,
                    busco_count = result.busco_count,
                    elapsed_secs,
                    "Assessment complete"
                );
                Outcome::Success(result)
            },
            Err(e) => {
                warn!(annotation_id = %id, step = %e.step(), error = %e, elapsed_secs, "Assessment failed");
                Outcome::Failure(ErrorRecord::now(id, e.step()))
            },
        }
    }

    /// Run every step in `work`, which is recreated empty first
    pub async fn run(&self, record: &AnnotationRecord, work: &Path) -> Result<BuscoResult, StepError> {
        let work = std::path::absolute(work).step(Step::UnexpectedError)?;
        if work.exists() {
            tokio::fs::remove_dir_all(&work)
                .await
                .context("clearing stale work directory")
                .step(Step::UnexpectedError)?;
        }
        tokio::fs::create_dir_all(&work)
            .await
            .context("creating work directory")
            .step(Step::UnexpectedError)?;

        let raw_gff = work.join("annotation.raw.gff3");
        let raw_genome = work.join("genome.raw.fna");
        self.acquire(&record.annotation_url, &raw_gff).await?;
        self.acquire(&record.assembly_url, &raw_genome).await?;

        let gff = work.join("annotation.gff3");
        let genome = work.join("genome.fna");
        self.normalize_ids(&raw_gff, &raw_genome, &gff, &genome).await?;

        let proteins = work.join("proteins.faa");
        self.extract_proteins(&gff, &genome, &proteins, &work).await?;

        let selected = work.join("longest_isoforms.faa");
        self.select_isoforms(&gff, &proteins, &selected).await?;

        let lineage_path = self.lineage_path()?;
        self.run_busco(&selected, &lineage_path, &work).await?;

        self.parse_results(&record.annotation_id, &work.join(BUSCO_OUT_NAME)).await
    }

    async fn acquire(&self, location: &str, dest: &Path) -> Result<(), StepError> {
        match self.downloader.fetch_to(location, dest).await {
            Ok(bytes) => {
                debug!(location, bytes, "Input ready");
                Ok(())
            },
            Err(e) if e.is_missing_input() => Err(StepError::new(Step::InputMissing, e)),
            Err(e) => Err(StepError::new(Step::Download, e)),
        }
    }

    async fn normalize_ids(
        &self,
        raw_gff: &Path,
        raw_genome: &Path,
        gff: &Path,
        genome: &Path,
    ) -> Result<(), StepError> {
        let (raw_gff, raw_genome) = (raw_gff.to_path_buf(), raw_genome.to_path_buf());
        let (gff, genome) = (gff.to_path_buf(), genome.to_path_buf());

        let stats = blocking(Step::NormalizeIds, move || {
            let ids = normalize::normalize_fasta_headers(&raw_genome, &genome)
                .context("rewriting assembly headers")?;
            let stats = normalize::alias_gff_seqids(&raw_gff, &gff, &ids)
                .context("aliasing annotation seqids")?;

            if stats.shared_ids == 0 {
                anyhow::bail!(
                    "annotation and assembly share no sequence IDs ({} assembly sequences)",
                    stats.fasta_records
                );
            }

            for raw in [&raw_gff, &raw_genome] {
                if let Err(e) = std::fs::remove_file(raw) {
                    debug!(path = %raw.display(), error = %e, "Could not remove raw input");
                }
            }
            Ok(stats)
        })
        .await?;

        if stats.unmatched_ids > 0 || stats.aliased_ids > 0 {
            info!(
                shared = stats.shared_ids,
                aliased = stats.aliased_ids,
                unmatched = stats.unmatched_ids,
                "Reconciled sequence IDs"
            );
        }
        Ok(())
    }

    async fn extract_proteins(
        &self,
        gff: &Path,
        genome: &Path,
        proteins: &Path,
        work: &Path,
    ) -> Result<(), StepError> {
        let command = self
            .gffread
            .clone()
            .arg("-y")
            .arg(path_arg(proteins))
            .arg("-g")
            .arg(path_arg(genome))
            .arg(path_arg(gff));

        self.run_tool(&command, work, Step::ExtractProteins).await?;

        let size = tokio::fs::metadata(proteins).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(StepError::msg(
                Step::ExtractProteins,
                "gffread produced no protein sequences",
            ));
        }
        Ok(())
    }

    async fn select_isoforms(&self, gff: &Path, proteins: &Path, selected: &Path) -> Result<(), StepError> {
        let (gff, proteins, selected) = (gff.to_path_buf(), proteins.to_path_buf(), selected.to_path_buf());

        blocking(Step::SelectIsoforms, move || {
            let selection = select_longest_isoforms(&gff, &proteins)?;
            if selection.is_empty() {
                anyhow::bail!("no gene has a protein sequence");
            }

            let mut out = BufWriter::new(std::fs::File::create(&selected)?);
            selection.write_fasta(&mut out)?;
            out.flush()?;
            Ok(())
        })
        .await
    }

    fn lineage_path(&self) -> Result<PathBuf, StepError> {
        let path = std::path::absolute(&self.config.busco.lineage_path).step(Step::LineageMissing)?;
        if !path.is_dir() {
            return Err(StepError::msg(
                Step::LineageMissing,
                format!("lineage dataset not found at {}", path.display()),
            ));
        }
        Ok(path)
    }

    async fn run_busco(&self, selected: &Path, lineage_path: &Path, work: &Path) -> Result<(), StepError> {
        let command = self
            .busco
            .clone()
            .arg("-i")
            .arg(path_arg(selected))
            .arg("-l")
            .arg(path_arg(lineage_path))
            .arg("-o")
            .arg(BUSCO_OUT_NAME)
            .arg("--out_path")
            .arg(path_arg(work))
            .arg("-m")
            .arg("proteins")
            .arg("--offline")
            .arg("-c")
            .arg(self.config.busco.cpu.to_string())
            .arg("-f");

        self.run_tool(&command, work, Step::RunBusco).await.map(|_| ())
    }

    async fn parse_results(&self, annotation_id: &str, out_dir: &Path) -> Result<BuscoResult, StepError> {
        let path = summary::find_summary(out_dir).step(Step::ParseResults)?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
            .step(Step::ParseResults)?;
        let parsed = summary::parse_summary(&text)
            .with_context(|| format!("parsing {}", path.display()))
            .step(Step::ParseResults)?;

        Ok(BuscoResult {
            annotation_id: annotation_id.to_string(),
            lineage: parsed.lineage.unwrap_or_else(|| self.config.busco.lineage.clone()),
            busco_count: parsed.total,
            complete: parsed.complete,
            single: parsed.single,
            duplicated: parsed.duplicated,
            fragmented: parsed.fragmented,
            missing: parsed.missing,
        })
    }

    async fn run_tool(&self, command: &CommandSpec, cwd: &Path, step: Step) -> Result<ToolOutput, StepError> {
        let output = self
            .runner
            .run(command, cwd)
            .await
            .with_context(|| format!("failed to start '{}'", command.program()))
            .step(step)?;

        if !output.success {
            let code = output
                .code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
            return Err(StepError::msg(
                step,
                format!(
                    "'{}' exited with {}: {}",
                    command.program(),
                    code,
                    output.stderr_tail(5)
                ),
            ));
        }
        Ok(output)
    }
}
