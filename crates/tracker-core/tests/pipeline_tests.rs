//! Pipeline and batch tests with a scripted tool runner
//!
//! The fake runner stands in for gffread and BUSCO: it writes the files the
//! real tools would write, or fails on request, so every step's failure path
//! can be driven without the tools installed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracker_common::{tsv, AnnotationRecord, BuscoResult, Step};
use tracker_core::pipeline::tools::{CommandSpec, ToolOutput, ToolRunner};
use tracker_core::{run_batch, BatchRequest, ChunkSpec, Outcome, PendingOrder, Pipeline, PipelineConfig};

const GFF: &str = "##gff-version 3\n\
chr1\t.\tgene\t1\t900\t.\t+\t.\tID=A\n\
chr1\t.\tmRNA\t1\t900\t.\t+\t.\tID=t1;Parent=A\n\
chr1\t.\tmRNA\t1\t900\t.\t+\t.\tID=t2;Parent=A\n\
chr1\t.\tmRNA\t1\t600\t.\t+\t.\tID=t3;Parent=B\n";

const GENOME: &str = ">1 Homo sapiens chromosome 1\nACGTACGTACGT\n";

const PROTEINS: &str = ">t1 gene=A\nMKV\n>t2 gene=A\nMKVLLA\n>t3 gene=B\nMQ\n";

const SUMMARY: &str = "\
# The lineage dataset is: eukaryota_odb12 (Creation date: 2024-01-08, number of BUSCOs: 129)
\tC:98.4%[S:97.7%,D:0.7%],F:0.8%,M:0.8%,n:129
\t129\tTotal BUSCO groups searched
";

#[derive(Default)]
struct Seen {
    commands: Vec<String>,
    gffread_annotation: Option<String>,
    busco_input: Option<String>,
}

#[derive(Default)]
struct FakeRunner {
    fail: Option<&'static str>,
    skip_summary: bool,
    seen: Arc<Mutex<Seen>>,
}

fn flag_value(args: &[String], flag: &str) -> PathBuf {
    let at = args.iter().position(|a| a == flag).unwrap();
    PathBuf::from(&args[at + 1])
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, command: &CommandSpec, _cwd: &Path) -> std::io::Result<ToolOutput> {
        let args = command.arguments();
        self.seen.lock().unwrap().commands.push(command.to_string());

        if self.fail == Some(command.program()) {
            return Ok(ToolOutput {
                code: Some(1),
                success: false,
                stderr: "simulated failure".to_string(),
                ..ToolOutput::default()
            });
        }

        match command.program() {
            "gffread" => {
                let annotation = std::fs::read_to_string(args.last().unwrap())?;
                self.seen.lock().unwrap().gffread_annotation = Some(annotation);
                std::fs::write(flag_value(args, "-y"), PROTEINS)?;
            },
            "busco" => {
                let input = std::fs::read_to_string(flag_value(args, "-i"))?;
                self.seen.lock().unwrap().busco_input = Some(input);
                if !self.skip_summary {
                    let out = flag_value(args, "--out_path").join(flag_value(args, "-o"));
                    std::fs::create_dir_all(&out)?;
                    std::fs::write(
                        out.join("short_summary.specific.eukaryota_odb12.busco_out.txt"),
                        SUMMARY,
                    )?;
                }
            },
            other => {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, other.to_string()));
            },
        }

        Ok(ToolOutput {
            code: Some(0),
            success: true,
            ..ToolOutput::default()
        })
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    config: PipelineConfig,
}

impl Fixture {
    fn new(genome: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("annotation.gff3"), GFF).unwrap();
        std::fs::write(dir.path().join("genome.fna"), genome).unwrap();

        let lineage = dir.path().join("lineages/eukaryota_odb12");
        std::fs::create_dir_all(&lineage).unwrap();

        let mut config = PipelineConfig::default();
        config.work.work_dir = dir.path().join("work");
        config.busco.lineage_path = lineage;
        config.http.max_retries = 1;

        Self { dir, config }
    }

    fn record(&self, id: &str) -> AnnotationRecord {
        AnnotationRecord::new(
            id,
            self.dir.path().join("annotation.gff3").to_string_lossy(),
            self.dir.path().join("genome.fna").to_string_lossy(),
        )
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }
}

fn failed_step(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Failure(error) => error.step.clone(),
        Outcome::Success(result) => panic!("expected failure, got {result:?}"),
    }
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_successful_assessment() {
    let fixture = Fixture::new(GENOME);
    let runner = FakeRunner::default();
    let seen = runner.seen.clone();
    let pipeline = Pipeline::new(fixture.config.clone(), runner).unwrap();

    let outcome = pipeline.analyze(&fixture.record("GCF_1.1")).await;

    assert_eq!(
        outcome,
        Outcome::Success(BuscoResult {
            annotation_id: "GCF_1.1".to_string(),
            lineage: "eukaryota_odb12".to_string(),
            busco_count: 129,
            complete: 98.4,
            single: 97.7,
            duplicated: 0.7,
            fragmented: 0.8,
            missing: 0.8,
        })
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.busco_input.as_deref(), Some(">t2 gene=A\nMKVLLA\n>t3 gene=B\nMQ\n"));
    assert!(seen
        .gffread_annotation
        .as_deref()
        .unwrap()
        .lines()
        .skip(1)
        .all(|line| line.starts_with("1\t")));
    assert!(seen.commands[1].contains("-m proteins --offline -c 1 -f"));

    assert!(!pipeline.work_dir_for("GCF_1.1").exists());
}

#[tokio::test]
async fn test_keep_work_dir() {
    let mut fixture = Fixture::new(GENOME);
    fixture.config.work.keep_work_dir = true;
    let pipeline = Pipeline::new(fixture.config.clone(), FakeRunner::default()).unwrap();

    assert!(pipeline.analyze(&fixture.record("g1")).await.is_success());
    assert!(pipeline.work_dir_for("g1").join("longest_isoforms.faa").exists());
}

#[tokio::test]
async fn test_missing_input() {
    let fixture = Fixture::new(GENOME);
    let pipeline = Pipeline::new(fixture.config.clone(), FakeRunner::default()).unwrap();

    let record = AnnotationRecord::new("g1", fixture.path("absent.gff3").to_string_lossy(), "x");
    let outcome = pipeline.analyze(&record).await;
    assert_eq!(failed_step(&outcome), Step::InputMissing.as_str());
}

#[tokio::test]
async fn test_no_shared_sequence_ids() {
    let fixture = Fixture::new(">scaffold_9\nACGT\n");
    let pipeline = Pipeline::new(fixture.config.clone(), FakeRunner::default()).unwrap();

    let outcome = pipeline.analyze(&fixture.record("g1")).await;
    assert_eq!(failed_step(&outcome), "normalize_ids");
}

#[tokio::test]
async fn test_gffread_failure() {
    let fixture = Fixture::new(GENOME);
    let runner = FakeRunner {
        fail: Some("gffread"),
        ..FakeRunner::default()
    };
    let pipeline = Pipeline::new(fixture.config.clone(), runner).unwrap();

    let outcome = pipeline.analyze(&fixture.record("g1")).await;
    assert_eq!(failed_step(&outcome), "extract_proteins");
}

#[tokio::test]
async fn test_lineage_missing() {
    let mut fixture = Fixture::new(GENOME);
    fixture.config.busco.lineage_path = fixture.path("nowhere/eukaryota_odb12");
    let runner = FakeRunner::default();
    let seen = runner.seen.clone();
    let pipeline = Pipeline::new(fixture.config.clone(), runner).unwrap();

    let outcome = pipeline.analyze(&fixture.record("g1")).await;
    assert_eq!(failed_step(&outcome), "lineage_missing");
    assert_eq!(seen.lock().unwrap().commands.len(), 1);
}

#[tokio::test]
async fn test_busco_failure_and_missing_summary() {
    let fixture = Fixture::new(GENOME);

    let failing = FakeRunner {
        fail: Some("busco"),
        ..FakeRunner::default()
    };
    let pipeline = Pipeline::new(fixture.config.clone(), failing).unwrap();
    assert_eq!(failed_step(&pipeline.analyze(&fixture.record("g1")).await), "run_busco");

    let silent = FakeRunner {
        skip_summary: true,
        ..FakeRunner::default()
    };
    let pipeline = Pipeline::new(fixture.config.clone(), silent).unwrap();
    assert_eq!(failed_step(&pipeline.analyze(&fixture.record("g1")).await), "parse_results");
}

// ============================================================================
// Batch Tests
// ============================================================================

#[tokio::test]
async fn test_batch_processes_only_pending_ids() {
    let fixture = Fixture::new(GENOME);
    let registry = fixture.path("annotations.tsv");
    let results = fixture.path("results.tsv");
    tsv::write_registry(
        &registry,
        &[fixture.record("g1"), fixture.record("g2"), fixture.record("g3")],
    )
    .unwrap();
    std::fs::write(&results, "g1\teukaryota_odb12\t129\t99.0\t99.0\t0.0\t0.0\t1.0\n").unwrap();

    let pipeline = Pipeline::new(fixture.config.clone(), FakeRunner::default()).unwrap();
    let request = BatchRequest {
        registry,
        results,
        errors: fixture.path("errors.tsv"),
        chunk: ChunkSpec::new(0, 1).unwrap(),
        output_dir: fixture.path("out/chunk_0"),
        max_per_job: None,
        order: PendingOrder::Registry,
    };

    let summary = run_batch(&pipeline, &request).await.unwrap();

    assert_eq!(summary.pending_total, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert!(fixture.path("out/chunk_0/result_g2.tsv").exists());
    assert!(fixture.path("out/chunk_0/result_g3.tsv").exists());
    assert!(!fixture.path("out/chunk_0/result_g1.tsv").exists());
}

#[tokio::test]
async fn test_batch_records_failures_and_still_succeeds() {
    let fixture = Fixture::new(GENOME);
    let registry = fixture.path("annotations.tsv");
    tsv::write_registry(
        &registry,
        &[
            AnnotationRecord::new("broken", "/no/such.gff3", "/no/such.fna"),
            fixture.record("ok"),
            fixture.record("later"),
        ],
    )
    .unwrap();

    let pipeline = Pipeline::new(fixture.config.clone(), FakeRunner::default()).unwrap();
    let request = BatchRequest {
        registry,
        results: fixture.path("results.tsv"),
        errors: fixture.path("errors.tsv"),
        chunk: ChunkSpec::new(0, 2).unwrap(),
        output_dir: fixture.path("out"),
        max_per_job: None,
        order: PendingOrder::Registry,
    };

    let summary = run_batch(&pipeline, &request).await.unwrap();

    // chunk 0 of 2 owns positions 0 and 2
    assert_eq!(summary.assigned, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    let errors = tsv::read_error_fragment(fixture.path("out/log_broken.tsv")).unwrap();
    assert_eq!(errors[0].step, "input_missing");
    assert!(fixture.path("out/result_later.tsv").exists());
}

#[tokio::test]
async fn test_batch_setup_failure_is_an_error() {
    let fixture = Fixture::new(GENOME);
    let pipeline = Pipeline::new(fixture.config.clone(), FakeRunner::default()).unwrap();
    let request = BatchRequest {
        registry: fixture.path("missing.tsv"),
        results: fixture.path("results.tsv"),
        errors: fixture.path("errors.tsv"),
        chunk: ChunkSpec::new(0, 1).unwrap(),
        output_dir: fixture.path("out"),
        max_per_job: Some(5),
        order: PendingOrder::Registry,
    };

    assert!(run_batch(&pipeline, &request).await.is_err());
}
