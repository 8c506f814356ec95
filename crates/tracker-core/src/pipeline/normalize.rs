//! Sequence ID reconciliation between annotation and assembly
//!
//! Assembly FASTA headers often carry a description after the ID
//! (`>NC_000001.11 Homo sapiens chromosome 1`) and annotations sometimes name
//! sequences `chr1` where the assembly says `1`, or the reverse. gffread
//! needs the GFF seqid column to match a FASTA ID exactly.

use std::collections::HashSet;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use tracker_common::io::open_reader;

const CHR_PREFIX: &str = "chr";

/// What normalisation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub fasta_records: usize,
    /// Distinct GFF seqids that resolve to an assembly sequence
    pub shared_ids: usize,
    /// Distinct GFF seqids renamed by toggling the `chr` prefix
    pub aliased_ids: usize,
    /// Distinct GFF seqids with no assembly sequence
    pub unmatched_ids: usize,
}

/// Copy `src` to `dest` with every header cut to its first token.
///
/// Returns the set of sequence IDs.
pub fn normalize_fasta_headers(src: &Path, dest: &Path) -> tracker_common::Result<HashSet<String>> {
    let reader = open_reader(src)?;
    let mut out = BufWriter::new(std::fs::File::create(dest)?);
    let mut ids = HashSet::new();

    for line in reader.lines() {
        let line = line?;
        match line.strip_prefix('>') {
            Some(header) => {
                let id = header.split_whitespace().next().unwrap_or_default();
                writeln!(out, ">{id}")?;
                ids.insert(id.to_string());
            },
            None => writeln!(out, "{}", line.trim_end())?,
        }
    }
    out.flush()?;

    Ok(ids)
}

/// Resolve a GFF seqid against the assembly IDs
fn resolve<'a>(seqid: &'a str, fasta_ids: &HashSet<String>) -> Option<std::borrow::Cow<'a, str>> {
    if fasta_ids.contains(seqid) {
        return Some(seqid.into());
    }
    if let Some(bare) = seqid.strip_prefix(CHR_PREFIX) {
        if fasta_ids.contains(bare) {
            return Some(bare.into());
        }
    }
    let prefixed = format!("{CHR_PREFIX}{seqid}");
    if fasta_ids.contains(&prefixed) {
        return Some(prefixed.into());
    }
    None
}

/// Copy the GFF at `src` to `dest`, renaming seqids that only match the
/// assembly with the `chr` prefix toggled.
///
/// Content after a `##FASTA` directive is copied unchanged.
pub fn alias_gff_seqids(
    src: &Path,
    dest: &Path,
    fasta_ids: &HashSet<String>,
) -> tracker_common::Result<NormalizeStats> {
    let reader = open_reader(src)?;
    let mut out = BufWriter::new(std::fs::File::create(dest)?);

    let mut shared = HashSet::new();
    let mut aliased = HashSet::new();
    let mut unmatched = HashSet::new();
    let mut in_fasta = false;

    for line in reader.lines() {
        let line = line?;

        if in_fasta || line.starts_with('#') || line.trim().is_empty() {
            in_fasta |= line.starts_with("##FASTA");
            writeln!(out, "{line}")?;
            continue;
        }

        let (seqid, rest) = line.split_once('\t').unwrap_or((line.as_str(), ""));
        match resolve(seqid, fasta_ids) {
            Some(resolved) => {
                if resolved != seqid {
                    aliased.insert(seqid.to_string());
                }
                shared.insert(seqid.to_string());
                writeln!(out, "{resolved}\t{rest}")?;
            },
            None => {
                unmatched.insert(seqid.to_string());
                writeln!(out, "{line}")?;
            },
        }
    }
    out.flush()?;

    Ok(NormalizeStats {
        fasta_records: fasta_ids.len(),
        shared_ids: shared.len(),
        aliased_ids: aliased.len(),
        unmatched_ids: unmatched.len(),
    })
}
