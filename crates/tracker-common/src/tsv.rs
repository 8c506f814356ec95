//! Tab-separated tables and fragments
//!
//! Three canonical tables drive the tracker:
//!
//! - registry: `annotation_id, annotation_url, assembly_url`
//! - results: `annotation_id, lineage, busco_count, complete, single, duplicated, fragmented, missing`
//! - errors: `annotation_id, run_at, step`
//!
//! Workers never touch the canonical result and error tables. Each processed
//! item produces one fragment file (`result_<id>.tsv` or `log_<id>.tsv`) with
//! the same column layout, and the aggregator folds fragments into the tables.
//!
//! A header row is optional on read (recognised by a first field of
//! `annotation_id`) and always written.

use crate::error::{Result, TrackerError};
use crate::types::{format_percent, AnnotationRecord, BuscoResult, ErrorRecord};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const REGISTRY_HEADER: [&str; 3] = ["annotation_id", "annotation_url", "assembly_url"];

pub const RESULT_HEADER: [&str; 8] = [
    "annotation_id",
    "lineage",
    "busco_count",
    "complete",
    "single",
    "duplicated",
    "fragmented",
    "missing",
];

pub const ERROR_HEADER: [&str; 3] = ["annotation_id", "run_at", "step"];

/// File name prefix of result fragments
pub const RESULT_FRAGMENT_PREFIX: &str = "result_";

/// File name prefix of error fragments
pub const ERROR_FRAGMENT_PREFIX: &str = "log_";

const FRAGMENT_EXTENSION: &str = ".tsv";

/// Which outcome a fragment file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Result,
    Error,
}

impl FragmentKind {
    /// Classify a fragment by its file name; `None` for unrelated files
    pub fn from_file_name(name: &str) -> Option<Self> {
        if !name.ends_with(FRAGMENT_EXTENSION) {
            return None;
        }
        if name.starts_with(RESULT_FRAGMENT_PREFIX) {
            Some(FragmentKind::Result)
        } else if name.starts_with(ERROR_FRAGMENT_PREFIX) {
            Some(FragmentKind::Error)
        } else {
            None
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            FragmentKind::Result => RESULT_FRAGMENT_PREFIX,
            FragmentKind::Error => ERROR_FRAGMENT_PREFIX,
        }
    }
}

/// Hex digits of the ID digest appended to rewritten stems
const STEM_DIGEST_LEN: usize = 8;

/// An annotation ID reduced to `[A-Za-z0-9._-]`, usable as a single path component.
///
/// IDs that are already safe come back unchanged. Any ID that had to be
/// rewritten gets `-<digest>` of the raw ID appended, so `a/b` and `a_b` never
/// share a fragment or work directory.
pub fn safe_file_stem(annotation_id: &str) -> String {
    let mut safe: String = annotation_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut rewritten = safe != annotation_id;

    // "", "." and ".." would name the parent directory instead
    if safe.chars().all(|c| c == '.') {
        safe.insert(0, '_');
        rewritten = true;
    }

    if rewritten {
        let digest = hex::encode(Sha256::digest(annotation_id.as_bytes()));
        safe.push('-');
        safe.push_str(&digest[..STEM_DIGEST_LEN]);
    }
    safe
}

/// Fragment file name for an annotation, with unsafe path characters replaced
pub fn fragment_file_name(kind: FragmentKind, annotation_id: &str) -> String {
    format!("{}{}{}", kind.prefix(), safe_file_stem(annotation_id), FRAGMENT_EXTENSION)
}

// ============================================================================
// Reading
// ============================================================================

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(b'\t').has_headers(false).flexible(true);
    builder
}

fn is_header(record: &StringRecord) -> bool {
    record.get(0).map(str::trim) == Some("annotation_id")
}

/// Read every data row of a TSV file, skipping blank lines and an optional header.
///
/// Rows come back with their 1-based line number for error messages.
fn read_rows(path: &Path) -> Result<Vec<(u64, StringRecord)>> {
    let mut reader = reader_builder().from_path(path)?;
    let mut rows = Vec::new();
    let mut first_content = true;

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        // The header may only open the table, but blank lines can precede it
        if std::mem::take(&mut first_content) && is_header(&record) {
            continue;
        }
        rows.push((line, record));
    }

    Ok(rows)
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or_default().trim()
}

fn expect_columns(record: &StringRecord, expected: usize) -> std::result::Result<(), String> {
    if record.len() != expected {
        return Err(format!("expected {} columns, found {}", expected, record.len()));
    }
    if field(record, 0).is_empty() {
        return Err("empty annotation_id".to_string());
    }
    Ok(())
}

fn parse_percent(record: &StringRecord, idx: usize) -> std::result::Result<f64, String> {
    let raw = field(record, idx);
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("column {} is not a number: '{}'", RESULT_HEADER[idx], raw))
}

/// Parse one result row
pub fn parse_result_row(record: &StringRecord) -> std::result::Result<BuscoResult, String> {
    expect_columns(record, RESULT_HEADER.len())?;

    let raw_count = field(record, 2);
    let busco_count = raw_count
        .parse::<u32>()
        .map_err(|_| format!("column busco_count is not an integer: '{}'", raw_count))?;

    Ok(BuscoResult {
        annotation_id: field(record, 0).to_string(),
        lineage: field(record, 1).to_string(),
        busco_count,
        complete: parse_percent(record, 3)?,
        single: parse_percent(record, 4)?,
        duplicated: parse_percent(record, 5)?,
        fragmented: parse_percent(record, 6)?,
        missing: parse_percent(record, 7)?,
    })
}

/// Parse one error row
pub fn parse_error_row(record: &StringRecord) -> std::result::Result<ErrorRecord, String> {
    expect_columns(record, ERROR_HEADER.len())?;

    let run_at = field(record, 1);
    if run_at.is_empty() {
        return Err("empty run_at".to_string());
    }

    Ok(ErrorRecord::new(field(record, 0), run_at, field(record, 2)))
}

fn read_typed<T>(
    path: &Path,
    parse: impl Fn(&StringRecord) -> std::result::Result<T, String>,
) -> Result<Vec<T>> {
    read_rows(path)?
        .into_iter()
        .map(|(line, record)| {
            parse(&record)
                .map_err(|reason| TrackerError::invalid_record(path, format!("line {line}: {reason}")))
        })
        .collect()
}

/// Load the set of annotation IDs in the first column of a table.
///
/// A missing file is an empty table.
pub fn load_ids(path: impl AsRef<Path>) -> Result<HashSet<String>> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "Table not found, treating as empty");
        return Ok(HashSet::new());
    }

    let ids: HashSet<String> = read_rows(path)?
        .iter()
        .map(|(_, record)| field(record, 0).to_string())
        .filter(|id| !id.is_empty())
        .collect();

    debug!(path = %path.display(), count = ids.len(), "Loaded annotation IDs");
    Ok(ids)
}

/// Load the annotation registry in file order.
///
/// Duplicate IDs keep their first row. A missing registry is an error.
pub fn load_registry(path: impl AsRef<Path>) -> Result<Vec<AnnotationRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TrackerError::FileNotFound(path.to_path_buf()));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (line, record) in read_rows(path)? {
        if record.len() < REGISTRY_HEADER.len() {
            return Err(TrackerError::invalid_record(
                path,
                format!("line {line}: expected {} columns, found {}", REGISTRY_HEADER.len(), record.len()),
            ));
        }

        let id = field(&record, 0);
        if id.is_empty() {
            continue;
        }
        if !seen.insert(id.to_string()) {
            warn!(annotation_id = %id, line, "Duplicate registry row ignored");
            continue;
        }

        records.push(AnnotationRecord::new(id, field(&record, 1), field(&record, 2)));
    }

    debug!(path = %path.display(), count = records.len(), "Loaded registry");
    Ok(records)
}

/// Read a canonical result table; a missing file is empty
pub fn read_result_table(path: impl AsRef<Path>) -> Result<Vec<BuscoResult>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_typed(path, parse_result_row)
}

/// Read a canonical error table; a missing file is empty
pub fn read_error_table(path: impl AsRef<Path>) -> Result<Vec<ErrorRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_typed(path, parse_error_row)
}

/// Read the rows of a result fragment, failing on the first malformed row
pub fn read_result_fragment(path: impl AsRef<Path>) -> Result<Vec<BuscoResult>> {
    read_typed(path.as_ref(), parse_result_row)
}

/// Read the rows of an error fragment, failing on the first malformed row
pub fn read_error_fragment(path: impl AsRef<Path>) -> Result<Vec<ErrorRecord>> {
    read_typed(path.as_ref(), parse_error_row)
}

// ============================================================================
// Writing
// ============================================================================

fn result_fields(result: &BuscoResult) -> [String; 8] {
    [
        result.annotation_id.clone(),
        result.lineage.clone(),
        result.busco_count.to_string(),
        format_percent(result.complete),
        format_percent(result.single),
        format_percent(result.duplicated),
        format_percent(result.fragmented),
        format_percent(result.missing),
    ]
}

fn error_fields(error: &ErrorRecord) -> [&str; 3] {
    [&error.annotation_id, &error.run_at, &error.step]
}

/// Write a file by filling a temp file in the same directory and renaming it over `path`
fn write_atomic(path: &Path, fill: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| TrackerError::Io(e.error))?;
    Ok(())
}

fn write_table<'a, I, R>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = &'a str>,
{
    write_atomic(path, |out| {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(out);
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Rewrite the registry file
pub fn write_registry(path: impl AsRef<Path>, records: &[AnnotationRecord]) -> Result<()> {
    write_table(
        path.as_ref(),
        &REGISTRY_HEADER,
        records.iter().map(|r| {
            [
                r.annotation_id.as_str(),
                r.annotation_url.as_str(),
                r.assembly_url.as_str(),
            ]
        }),
    )
}

/// Rewrite a result table with the given rows, in the order given
pub fn write_result_table<'a>(
    path: impl AsRef<Path>,
    results: impl IntoIterator<Item = &'a BuscoResult>,
) -> Result<()> {
    let rows: Vec<[String; 8]> = results.into_iter().map(result_fields).collect();
    write_table(
        path.as_ref(),
        &RESULT_HEADER,
        rows.iter().map(|row| row.iter().map(String::as_str)),
    )
}

/// Rewrite an error table with the given rows, in the order given
pub fn write_error_table<'a>(
    path: impl AsRef<Path>,
    errors: impl IntoIterator<Item = &'a ErrorRecord>,
) -> Result<()> {
    write_table(path.as_ref(), &ERROR_HEADER, errors.into_iter().map(error_fields))
}

/// Write the fragment for a successful item into `dir`
pub fn write_result_fragment(dir: impl AsRef<Path>, result: &BuscoResult) -> Result<PathBuf> {
    let path = dir
        .as_ref()
        .join(fragment_file_name(FragmentKind::Result, &result.annotation_id));
    write_result_table(&path, [result])?;
    Ok(path)
}

/// Write the fragment for a failed item into `dir`
pub fn write_error_fragment(dir: impl AsRef<Path>, error: &ErrorRecord) -> Result<PathBuf> {
    let path = dir
        .as_ref()
        .join(fragment_file_name(FragmentKind::Error, &error.annotation_id));
    write_error_table(&path, [error])?;
    Ok(path)
}
