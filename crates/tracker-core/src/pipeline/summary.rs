//! BUSCO short summary parsing
//!
//! A short summary looks like:
//!
//! ```text
//! # The lineage dataset is: eukaryota_odb12 (Creation date: 2024-01-08, number of genomes: 70, number of BUSCOs: 129)
//!         C:98.4%[S:97.7%,D:0.7%],F:0.8%,M:0.8%,n:129
//!         129     Total BUSCO groups searched
//! ```

use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const SUMMARY_PREFIX: &str = "short_summary";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("no short_summary*.txt under {}", .0.display())]
    NotFound(PathBuf),

    #[error("summary has no '{0}' value")]
    MissingField(&'static str),

    #[error("summary field '{field}' is not a number: '{value}'")]
    BadNumber { field: &'static str, value: String },

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Figures from one short summary
#[derive(Debug, Clone, PartialEq)]
pub struct BuscoSummary {
    /// Lineage named in the summary, if it names one
    pub lineage: Option<String>,
    pub complete: f64,
    pub single: f64,
    pub duplicated: f64,
    pub fragmented: f64,
    pub missing: f64,
    pub total: u32,
}

fn percent_pattern(tag: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\b{tag}:(\d+(?:\.\d+)?)%"))
}

fn capture<'t>(re: &Regex, text: &'t str, field: &'static str) -> Result<&'t str, SummaryError> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(SummaryError::MissingField(field))
}

fn percent(text: &str, tag: &'static str) -> Result<f64, SummaryError> {
    let raw = capture(&percent_pattern(tag)?, text, tag)?;
    raw.parse().map_err(|_| SummaryError::BadNumber {
        field: tag,
        value: raw.to_string(),
    })
}

/// Parse the text of a short summary
pub fn parse_summary(text: &str) -> Result<BuscoSummary, SummaryError> {
    let lineage = Regex::new(r"lineage dataset is:\s*(\S+)")?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let total_re = RegexBuilder::new(r"(\d+)\s+total BUSCO")
        .case_insensitive(true)
        .build()?;
    let raw_total = capture(&total_re, text, "total")?;
    let total = raw_total.parse().map_err(|_| SummaryError::BadNumber {
        field: "total",
        value: raw_total.to_string(),
    })?;

    Ok(BuscoSummary {
        lineage,
        complete: percent(text, "C")?,
        single: percent(text, "S")?,
        duplicated: percent(text, "D")?,
        fragmented: percent(text, "F")?,
        missing: percent(text, "M")?,
        total,
    })
}

/// Find the short summary BUSCO wrote somewhere under `dir`.
///
/// When several exist the lexicographically first path wins.
pub fn find_summary(dir: &Path) -> Result<PathBuf, SummaryError> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(SUMMARY_PREFIX) && name.ends_with(".txt")
        })
        .map(|entry| entry.into_path())
        .ok_or_else(|| SummaryError::NotFound(dir.to_path_buf()))
}
