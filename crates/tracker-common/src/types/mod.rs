//! Common types used across the BUSCO tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout of the `run_at` column.
pub const RUN_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the annotation registry.
///
/// Records are immutable once fetched; the registry is the universe of known work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Unique annotation identifier
    pub annotation_id: String,

    /// Location of the GFF3 annotation (URL or local path)
    pub annotation_url: String,

    /// Location of the genome assembly FASTA (URL or local path)
    pub assembly_url: String,
}

impl AnnotationRecord {
    pub fn new(
        annotation_id: impl Into<String>,
        annotation_url: impl Into<String>,
        assembly_url: impl Into<String>,
    ) -> Self {
        Self {
            annotation_id: annotation_id.into(),
            annotation_url: annotation_url.into(),
            assembly_url: assembly_url.into(),
        }
    }
}

/// Completeness metrics for one successfully assessed annotation.
///
/// Keyed by `annotation_id` in the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuscoResult {
    pub annotation_id: String,

    /// Lineage dataset the assessment ran against (e.g. `eukaryota_odb12`)
    pub lineage: String,

    /// Total number of marker genes in the lineage
    pub busco_count: u32,

    /// Percentages of the marker set
    pub complete: f64,
    pub single: f64,
    pub duplicated: f64,
    pub fragmented: f64,
    pub missing: f64,
}

/// A failed attempt at processing one annotation.
///
/// Keyed by `(annotation_id, run_at)` in the error table, so retries accumulate history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub annotation_id: String,

    /// UTC timestamp formatted with [`RUN_AT_FORMAT`]
    pub run_at: String,

    /// Name of the failing step (see [`Step`])
    pub step: String,
}

impl ErrorRecord {
    pub fn new(
        annotation_id: impl Into<String>,
        run_at: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            annotation_id: annotation_id.into(),
            run_at: run_at.into(),
            step: step.into(),
        }
    }

    /// Record a failure of `step` at the given instant
    pub fn at(annotation_id: impl Into<String>, step: Step, when: DateTime<Utc>) -> Self {
        Self::new(annotation_id, when.format(RUN_AT_FORMAT).to_string(), step.as_str())
    }

    /// Record a failure of `step` now
    pub fn now(annotation_id: impl Into<String>, step: Step) -> Self {
        Self::at(annotation_id, step, Utc::now())
    }

    /// Dedup key in the error table
    pub fn key(&self) -> (String, String) {
        (self.annotation_id.clone(), self.run_at.clone())
    }
}

/// Per-item pipeline steps, as written to the `step` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Annotation or assembly could not be downloaded
    Download,
    /// Annotation or assembly is missing or empty
    InputMissing,
    /// Sequence identifiers could not be reconciled between GFF and FASTA
    NormalizeIds,
    /// Protein translation by the extraction tool failed
    ExtractProteins,
    /// No gene produced a protein sequence
    SelectIsoforms,
    /// Configured lineage dataset is absent
    LineageMissing,
    /// Completeness tool exited unsuccessfully
    RunBusco,
    /// Completeness summary is missing or malformed
    ParseResults,
    /// Anything not attributable to a named step
    UnexpectedError,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Download => "download",
            Step::InputMissing => "input_missing",
            Step::NormalizeIds => "normalize_ids",
            Step::ExtractProteins => "extract_proteins",
            Step::SelectIsoforms => "select_isoforms",
            Step::LineageMissing => "lineage_missing",
            Step::RunBusco => "run_busco",
            Step::ParseResults => "parse_results",
            Step::UnexpectedError => "unexpected_error",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Step {
    type Err = crate::TrackerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "download" => Ok(Step::Download),
            "input_missing" => Ok(Step::InputMissing),
            "normalize_ids" => Ok(Step::NormalizeIds),
            "extract_proteins" => Ok(Step::ExtractProteins),
            "select_isoforms" => Ok(Step::SelectIsoforms),
            "lineage_missing" => Ok(Step::LineageMissing),
            "run_busco" => Ok(Step::RunBusco),
            "parse_results" => Ok(Step::ParseResults),
            "unexpected_error" => Ok(Step::UnexpectedError),
            other => Err(crate::TrackerError::parse(format!("unknown step: {other}"))),
        }
    }
}

/// Canonical text form of a percentage column.
///
/// Whole numbers keep one decimal (`98.0`) so tables match what BUSCO prints;
/// anything else uses the shortest round-tripping form.
pub fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
