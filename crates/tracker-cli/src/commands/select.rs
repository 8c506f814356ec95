//! `busco-tracker select` command implementation
//!
//! Writes one protein per gene, the longest isoform, as FASTA.

use crate::error::Result;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;
use tracker_core::isoform::select_longest_isoforms;

/// Select the longest isoform of every gene
pub async fn run(annotation: &Path, proteins: &Path, output: Option<&Path>) -> Result<()> {
    let selection = select_longest_isoforms(annotation, proteins)?;

    if selection.is_empty() {
        warn!(
            annotation = %annotation.display(),
            proteins = %proteins.display(),
            "No gene has a protein sequence, output is empty"
        );
    }

    match output {
        Some(path) => {
            let mut out = BufWriter::new(std::fs::File::create(path)?);
            selection.write_fasta(&mut out)?;
            out.flush()?;
        },
        None => {
            let stdout = std::io::stdout();
            selection.write_fasta(stdout.lock())?;
        },
    }

    Ok(())
}
