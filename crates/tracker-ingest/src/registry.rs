//! Annotation registry refresh
//!
//! The annotation API returns either a bare JSON array of records or a
//! paginated envelope `{"results": [...], "next": "<url>"}`. Records already
//! in the registry are never rewritten; only unseen IDs are appended.

use crate::download::Downloader;
use crate::error::{IngestError, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use tracker_common::{tsv, AnnotationRecord, TrackerError};

/// Upper bound on followed `next` links
pub const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiPage {
    List(Vec<Value>),
    Paged {
        results: Vec<Value>,
        #[serde(default)]
        next: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ApiAnnotation {
    #[serde(alias = "id", deserialize_with = "id_string")]
    annotation_id: String,

    #[serde(alias = "gff_url", alias = "annotation_file")]
    annotation_url: String,

    #[serde(alias = "fasta_url", alias = "assembly_file")]
    assembly_url: String,
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "annotation id must be a string or number, got {other}"
        ))),
    }
}

impl ApiAnnotation {
    fn into_record(self) -> Option<AnnotationRecord> {
        let fields = [&self.annotation_id, &self.annotation_url, &self.assembly_url];
        // Registry rows are tab-separated; a field that would break the row is unusable
        if fields
            .iter()
            .any(|f| f.trim().is_empty() || f.contains(['\t', '\n', '\r']))
        {
            return None;
        }
        Some(AnnotationRecord::new(
            self.annotation_id.trim(),
            self.annotation_url.trim(),
            self.assembly_url.trim(),
        ))
    }
}

/// Decode one page, returning usable records and the next page URL
fn decode_page(page: ApiPage) -> (Vec<AnnotationRecord>, Option<String>) {
    let (values, next) = match page {
        ApiPage::List(values) => (values, None),
        ApiPage::Paged { results, next } => (results, next),
    };

    let records = values
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| {
            match serde_json::from_value::<ApiAnnotation>(value) {
                Ok(api) => {
                    let record = api.into_record();
                    if record.is_none() {
                        warn!(position, "Skipping annotation record with empty or malformed fields");
                    }
                    record
                },
                Err(e) => {
                    warn!(position, error = %e, "Skipping undecodable annotation record");
                    None
                },
            }
        })
        .collect();

    (records, next.filter(|n| !n.trim().is_empty()))
}

/// Fetch every annotation record the API lists, following pagination
pub async fn fetch_annotations(downloader: &Downloader, url: &str) -> Result<Vec<AnnotationRecord>> {
    let mut records = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(url.to_string());

    while let Some(page_url) = next.take() {
        if !visited.insert(page_url.clone()) {
            return Err(IngestError::Decode(format!("pagination loops back to {page_url}")));
        }
        if visited.len() > MAX_PAGES {
            return Err(IngestError::Decode(format!("more than {MAX_PAGES} pages")));
        }

        debug!(url = %page_url, "Fetching annotation page");
        let page: ApiPage = downloader.get_json(&page_url).await?;
        let (page_records, page_next) = decode_page(page);
        records.extend(page_records);
        next = page_next;
    }

    info!(count = records.len(), pages = visited.len(), "Fetched annotation records");
    Ok(records)
}

/// Append unseen IDs from `fetched` to `existing`, keeping existing rows untouched.
///
/// Returns the number of records added.
pub fn merge_registry(existing: &mut Vec<AnnotationRecord>, fetched: Vec<AnnotationRecord>) -> usize {
    let mut known: HashSet<String> = existing.iter().map(|r| r.annotation_id.clone()).collect();
    let before = existing.len();

    for record in fetched {
        if known.insert(record.annotation_id.clone()) {
            existing.push(record);
        }
    }

    existing.len() - before
}

/// Outcome of one registry refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshStats {
    /// Rows in the registry before the refresh
    pub existing: usize,
    /// Usable records returned by the API
    pub fetched: usize,
    /// Records appended
    pub added: usize,
}

/// Fetch from the API and merge into the registry file at `registry_path`.
///
/// A missing registry file is treated as empty and created.
pub async fn refresh_registry(
    downloader: &Downloader,
    url: &str,
    registry_path: impl AsRef<Path>,
) -> Result<RefreshStats> {
    let registry_path = registry_path.as_ref();

    let mut registry = match tsv::load_registry(registry_path) {
        Ok(records) => records,
        Err(TrackerError::FileNotFound(_)) => {
            info!(path = %registry_path.display(), "No registry yet, starting empty");
            Vec::new()
        },
        Err(e) => return Err(e.into()),
    };
    let existing = registry.len();

    let fetched = fetch_annotations(downloader, url).await?;
    let fetched_count = fetched.len();
    let added = merge_registry(&mut registry, fetched);

    tsv::write_registry(registry_path, &registry)?;
    info!(
        path = %registry_path.display(),
        existing,
        added,
        total = registry.len(),
        "Registry updated"
    );

    Ok(RefreshStats {
        existing,
        fetched: fetched_count,
        added,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(value: Value) -> ApiPage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_list_with_aliases() {
        let (records, next) = decode_page(page(json!([
            {"annotation_id": "a1", "annotation_url": "u1", "assembly_url": "f1"},
            {"id": 42, "gff_url": "u2", "fasta_url": "f2"},
            {"id": "a3", "annotation_file": "u3", "assembly_file": "f3"}
        ])));

        assert!(next.is_none());
        assert_eq!(
            records,
            vec![
                AnnotationRecord::new("a1", "u1", "f1"),
                AnnotationRecord::new("42", "u2", "f2"),
                AnnotationRecord::new("a3", "u3", "f3"),
            ]
        );
    }

    #[test]
    fn test_decode_envelope_skips_bad_records() {
        let (records, next) = decode_page(page(json!({
            "results": [
                {"id": "ok", "gff_url": "u", "fasta_url": "f"},
                {"id": "no-assembly", "gff_url": "u"},
                {"id": "", "gff_url": "u", "fasta_url": "f"},
                {"id": "tab\tid", "gff_url": "u", "fasta_url": "f"},
                {"id": ["list"], "gff_url": "u", "fasta_url": "f"}
            ],
            "next": "https://api/p2"
        })));

        assert_eq!(records, vec![AnnotationRecord::new("ok", "u", "f")]);
        assert_eq!(next.as_deref(), Some("https://api/p2"));
    }

    #[test]
    fn test_decode_envelope_null_next() {
        let (_, next) = decode_page(page(json!({"results": [], "next": null})));
        assert!(next.is_none());
    }

    #[test]
    fn test_merge_keeps_existing_rows() {
        let mut registry = vec![
            AnnotationRecord::new("g1", "old-url", "old-fasta"),
            AnnotationRecord::new("g2", "u2", "f2"),
        ];
        let added = merge_registry(
            &mut registry,
            vec![
                AnnotationRecord::new("g1", "new-url", "new-fasta"),
                AnnotationRecord::new("g3", "u3", "f3"),
                AnnotationRecord::new("g3", "dup", "dup"),
            ],
        );

        assert_eq!(added, 1);
        assert_eq!(registry[0].annotation_url, "old-url");
        assert_eq!(registry[2], AnnotationRecord::new("g3", "u3", "f3"));
        assert_eq!(registry.len(), 3);
    }
}
