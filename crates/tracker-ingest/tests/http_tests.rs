//! HTTP tests for registry refresh and file download
//!
//! These tests cover:
//! - Paginated and bare-list registry responses
//! - Merging into an existing registry file
//! - Streaming downloads with gzip detection
//! - Retry on transient server errors, none on missing files

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::io::Write;
use tracker_common::{tsv, AnnotationRecord};
use tracker_ingest::registry::{fetch_annotations, refresh_registry};
use tracker_ingest::{Downloader, HttpConfig, IngestError};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn fast_downloader() -> Downloader {
    Downloader::new(HttpConfig {
        timeout_secs: 5,
        max_retries: 3,
        retry_backoff_secs: 0,
        ..HttpConfig::default()
    })
    .unwrap()
}

// ============================================================================
// Registry Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_follows_pagination() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/annotations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "g1", "gff_url": "https://x/g1.gff3", "fasta_url": "https://x/g1.fna"}],
            "next": format!("{}/api/annotations/page2", mock_server.uri())
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/annotations/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "g2", "gff_url": "https://x/g2.gff3", "fasta_url": "https://x/g2.fna"}],
            "next": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let records = fetch_annotations(
        &fast_downloader(),
        &format!("{}/api/annotations", mock_server.uri()),
    )
    .await
    .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.annotation_id.as_str()).collect();
    assert_eq!(ids, vec!["g1", "g2"]);
}

#[tokio::test]
async fn test_fetch_rejects_pagination_loop() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "next": format!("{}/loop", mock_server.uri())
        })))
        .mount(&mock_server)
        .await;

    let err = fetch_annotations(&fast_downloader(), &format!("{}/loop", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Decode(_)));
}

#[tokio::test]
async fn test_refresh_appends_only_new_ids() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("annotations.tsv");

    tsv::write_registry(
        &registry_path,
        &[AnnotationRecord::new("g1", "local/g1.gff3", "local/g1.fna")],
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/annotations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"annotation_id": "g1", "annotation_url": "changed", "assembly_url": "changed"},
            {"annotation_id": "g2", "annotation_url": "u2", "assembly_url": "f2"}
        ])))
        .mount(&mock_server)
        .await;

    let stats = refresh_registry(
        &fast_downloader(),
        &format!("{}/api/annotations", mock_server.uri()),
        &registry_path,
    )
    .await
    .unwrap();

    assert_eq!(stats.existing, 1);
    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.added, 1);

    let registry = tsv::load_registry(&registry_path).unwrap();
    assert_eq!(
        registry,
        vec![
            AnnotationRecord::new("g1", "local/g1.gff3", "local/g1.fna"),
            AnnotationRecord::new("g2", "u2", "f2"),
        ]
    );
}

#[tokio::test]
async fn test_refresh_creates_missing_registry() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("annotations.tsv");

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "gff_url": "u7", "fasta_url": "f7"}
        ])))
        .mount(&mock_server)
        .await;

    let stats = refresh_registry(
        &fast_downloader(),
        &format!("{}/api", mock_server.uri()),
        &registry_path,
    )
    .await
    .unwrap();

    assert_eq!(stats.added, 1);
    let contents = std::fs::read_to_string(&registry_path).unwrap();
    assert!(contents.starts_with("annotation_id\tannotation_url\tassembly_url\n"));
    assert!(contents.contains("7\tu7\tf7"));
}

// ============================================================================
// Download Tests
// ============================================================================

#[tokio::test]
async fn test_download_gunzips_remote_file() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(b"##gff-version 3\n").unwrap();
    let gz = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/g1.gff3.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gz))
        .mount(&mock_server)
        .await;

    let dest = dir.path().join("g1/annotation.gff3");
    let written = fast_downloader()
        .fetch_to(&format!("{}/files/g1.gff3.gz", mock_server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(written, 16);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "##gff-version 3\n");
    assert!(!dir.path().join("g1/annotation.gff3.part").exists());
}

#[tokio::test]
async fn test_download_retries_transient_failure() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/flaky.fna"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky.fna"))
        .respond_with(ResponseTemplate::new(200).set_body_string(">chr1\nACGT\n"))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let dest = dir.path().join("genome.fna");
    fast_downloader()
        .fetch_to(&format!("{}/flaky.fna", mock_server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), ">chr1\nACGT\n");
}

#[tokio::test]
async fn test_download_missing_remote_file_is_missing_input() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/gone.gff3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/withdrawn.fna"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    for name in ["gone.gff3", "withdrawn.fna"] {
        let err = fast_downloader()
            .fetch_to(
                &format!("{}/{}", mock_server.uri(), name),
                &dir.path().join(name),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::NotFound(_)), "{name}: {err}");
        assert!(err.is_missing_input());
    }
}

#[tokio::test]
async fn test_download_gives_up_after_max_retries() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/down.gff3"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = fast_downloader()
        .fetch_to(
            &format!("{}/down.gff3", mock_server.uri()),
            &dir.path().join("a.gff3"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Http(_)));
    assert!(!err.is_missing_input());
}

#[tokio::test]
async fn test_download_does_not_retry_client_errors() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/private.gff3"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = fast_downloader()
        .fetch_to(
            &format!("{}/private.gff3", mock_server.uri()),
            &dir.path().join("a.gff3"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Http(_)));
    assert!(!err.is_retryable());
    assert!(!err.is_missing_input());
}

#[tokio::test]
async fn test_download_empty_body_is_empty_input() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/empty.gff3"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let err = fast_downloader()
        .fetch_to(
            &format!("{}/empty.gff3", mock_server.uri()),
            &dir.path().join("a.gff3"),
        )
        .await
        .unwrap_err();

    assert!(err.is_missing_input());
}
