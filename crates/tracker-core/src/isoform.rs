//! Longest-isoform-per-gene selection
//!
//! Two passes over the inputs:
//!
//! 1. The GFF3 annotation yields a transcript → gene map from `mRNA` and
//!    `transcript` features (`ID=` is the transcript, `Parent=` the gene).
//! 2. The protein FASTA is streamed once; for every record whose ID maps to a
//!    gene, the record replaces the gene's current pick when it has strictly
//!    more residues.
//!
//! Only the current best record per gene is held in memory. Ties keep the
//! record met first in the protein FASTA. Output follows the order in which
//! genes first appear in the annotation, so repeated runs are byte-identical.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{debug, info};
use tracker_common::io::open_reader;
use tracker_common::Result;

/// Feature types that describe a transcript
const TRANSCRIPT_TYPES: [&str; 2] = ["mRNA", "transcript"];

/// GFF3 directive after which the file carries sequences, not features
const FASTA_DIRECTIVE: &str = "##FASTA";

// ============================================================================
// Transcript → gene map
// ============================================================================

/// Transcript → gene assignments parsed from a GFF3 annotation
#[derive(Debug, Default, Clone)]
pub struct TranscriptMap {
    transcript_to_gene: HashMap<String, String>,
    /// Genes in order of first appearance
    gene_order: Vec<String>,
    known_genes: HashSet<String>,
}

/// Extract the `ID` and first `Parent` value from a GFF3 attribute column
fn transcript_attributes(attributes: &str) -> (Option<&str>, Option<&str>) {
    let mut id = None;
    let mut parent = None;

    for pair in attributes.split(';') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "ID" if !value.is_empty() => id = Some(value),
            "Parent" => {
                parent = value.split(',').map(str::trim).find(|p| !p.is_empty());
            },
            _ => {},
        }
    }

    (id, parent)
}

impl TranscriptMap {
    /// Build the map from a GFF3 stream
    pub fn from_gff<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut map = Self::default();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            if line.starts_with(FASTA_DIRECTIVE) {
                break;
            }
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < 9 || !TRANSCRIPT_TYPES.contains(&columns[2]) {
                continue;
            }

            match transcript_attributes(columns[8]) {
                (Some(transcript), Some(gene)) => map.insert(transcript, gene),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(skipped, "Transcripts without ID or Parent dropped");
        }
        Ok(map)
    }

    /// Build the map from a plain or gzip-compressed GFF3 file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let reader = open_reader(path)?;
        Ok(Self::from_gff(reader)?)
    }

    fn insert(&mut self, transcript: &str, gene: &str) {
        if self.transcript_to_gene.contains_key(transcript) {
            return;
        }
        if self.known_genes.insert(gene.to_string()) {
            self.gene_order.push(gene.to_string());
        }
        self.transcript_to_gene
            .insert(transcript.to_string(), gene.to_string());
    }

    /// Gene a transcript belongs to
    pub fn gene_of(&self, transcript: &str) -> Option<&str> {
        self.transcript_to_gene.get(transcript).map(String::as_str)
    }

    pub fn transcript_count(&self) -> usize {
        self.transcript_to_gene.len()
    }

    pub fn gene_count(&self) -> usize {
        self.gene_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript_to_gene.is_empty()
    }

    /// Genes in order of first appearance in the annotation
    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.gene_order.iter().map(String::as_str)
    }
}

// ============================================================================
// FASTA streaming
// ============================================================================

/// One FASTA record with whitespace-free sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Header line as read, including the leading `>`
    pub header: String,
    pub sequence: String,
}

impl FastaRecord {
    /// First whitespace-delimited token after `>`
    pub fn id(&self) -> &str {
        self.header
            .trim_start_matches('>')
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    pub fn residues(&self) -> usize {
        self.sequence.len()
    }
}

/// Streaming FASTA reader. Lines before the first header are ignored.
pub struct FastaReader<R> {
    lines: io::Lines<R>,
    header: Option<String>,
    sequence: String,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            header: None,
            sequence: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = io::Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if line.starts_with('>') {
                        let header = line.trim_end_matches('\r').to_string();
                        if let Some(previous) = self.header.replace(header) {
                            return Some(Ok(FastaRecord {
                                header: previous,
                                sequence: std::mem::take(&mut self.sequence),
                            }));
                        }
                    } else if self.header.is_some() {
                        self.sequence
                            .extend(line.chars().filter(|c| !c.is_whitespace()));
                    }
                },
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    return self.header.take().map(|header| {
                        Ok(FastaRecord {
                            header,
                            sequence: std::mem::take(&mut self.sequence),
                        })
                    });
                },
            }
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// The protein chosen for one gene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedIsoform {
    pub gene_id: String,
    pub transcript_id: String,
    pub record: FastaRecord,
}

/// Counters describing one selection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub transcripts_mapped: usize,
    pub genes_annotated: usize,
    pub sequences_read: usize,
    pub sequences_matched: usize,
    pub genes_selected: usize,
}

/// One protein per gene, in annotation order
#[derive(Debug, Clone, Default)]
pub struct Selection {
    isoforms: Vec<SelectedIsoform>,
    stats: SelectionStats,
}

impl Selection {
    pub fn isoforms(&self) -> &[SelectedIsoform] {
        &self.isoforms
    }

    pub fn stats(&self) -> SelectionStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.isoforms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.isoforms.len()
    }

    /// Write one FASTA record per gene: original header, sequence on one line
    pub fn write_fasta<W: Write>(&self, mut out: W) -> io::Result<()> {
        for isoform in &self.isoforms {
            writeln!(out, "{}", isoform.record.header)?;
            writeln!(out, "{}", isoform.record.sequence)?;
        }
        out.flush()
    }
}

/// Pick the longest translated transcript of every gene in `transcripts`
pub fn select_from_fasta<R: BufRead>(transcripts: &TranscriptMap, proteins: R) -> io::Result<Selection> {
    let mut best: HashMap<String, SelectedIsoform> = HashMap::new();
    let mut stats = SelectionStats {
        transcripts_mapped: transcripts.transcript_count(),
        genes_annotated: transcripts.gene_count(),
        ..SelectionStats::default()
    };

    for record in FastaReader::new(proteins) {
        let record = record?;
        stats.sequences_read += 1;

        if record.sequence.is_empty() {
            continue;
        }
        let Some(gene) = transcripts.gene_of(record.id()) else {
            continue;
        };
        stats.sequences_matched += 1;

        let longer = best
            .get(gene)
            .map_or(true, |current| record.residues() > current.record.residues());
        if longer {
            best.insert(
                gene.to_string(),
                SelectedIsoform {
                    gene_id: gene.to_string(),
                    transcript_id: record.id().to_string(),
                    record,
                },
            );
        }
    }

    let isoforms: Vec<SelectedIsoform> = transcripts
        .genes()
        .filter_map(|gene| best.remove(gene))
        .collect();
    stats.genes_selected = isoforms.len();

    Ok(Selection { isoforms, stats })
}

/// Run both passes over an annotation file and a protein file (plain or gzip)
pub fn select_longest_isoforms(
    annotation: impl AsRef<Path>,
    proteins: impl AsRef<Path>,
) -> Result<Selection> {
    let annotation = annotation.as_ref();
    let proteins = proteins.as_ref();

    let transcripts = TranscriptMap::from_path(annotation)?;
    debug!(
        annotation = %annotation.display(),
        transcripts = transcripts.transcript_count(),
        genes = transcripts.gene_count(),
        "Built transcript map"
    );

    let selection = select_from_fasta(&transcripts, open_reader(proteins)?)?;
    let stats = selection.stats();
    info!(
        genes_annotated = stats.genes_annotated,
        sequences_read = stats.sequences_read,
        sequences_matched = stats.sequences_matched,
        genes_selected = stats.genes_selected,
        "Selected longest isoform per gene"
    );

    Ok(selection)
}
