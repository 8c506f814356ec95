//! Input helpers
//!
//! Annotation and sequence files arrive either plain or gzip-compressed
//! (`.gff3.gz`, `.fna.gz`). Readers here sniff the gzip magic bytes instead of
//! trusting the file extension.

use crate::error::{Result, TrackerError};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether the first bytes of a stream mark gzip data
pub fn is_gzip(prefix: &[u8]) -> bool {
    prefix.len() >= 2 && prefix[..2] == GZIP_MAGIC
}

/// Open a file for line-oriented reading, decompressing gzip transparently
pub fn open_reader(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TrackerError::FileNotFound(path.to_path_buf()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let gzipped = is_gzip(reader.fill_buf()?);

    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}
