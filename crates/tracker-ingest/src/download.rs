//! File acquisition
//!
//! Registry rows point at annotation and assembly files either by http(s)
//! URL or by local path. [`Downloader::fetch_to`] puts a plain
//! (decompressed) copy at a destination path in both cases, so downstream
//! tools never see gzip.

use crate::error::{IngestError, Result};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

// ============================================================================
// HTTP Configuration Constants
// ============================================================================

/// Default request timeout; assemblies run to several GB.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 600;

/// Default number of attempts per request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts; attempt `n` waits `n` times this.
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 2;

/// Configuration for HTTP transfers
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,

    /// Attempts per request, including the first
    pub max_retries: u32,

    pub retry_backoff_secs: u64,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            user_agent: concat!("busco-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(IngestError::Config("Timeout must be greater than 0".to_string()));
        }
        if self.max_retries == 0 {
            return Err(IngestError::Config("Max retries must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Where a registry location points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(String),
    Local(PathBuf),
}

impl Source {
    /// Classify a registry location
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(IngestError::NotFound("empty location".to_string()));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Source::Remote(location.to_string()));
        }
        if let Some(path) = location.strip_prefix("file://") {
            return Ok(Source::Local(PathBuf::from(path)));
        }
        if location.contains("://") {
            return Err(IngestError::UnsupportedSource(location.to_string()));
        }
        Ok(Source::Local(PathBuf::from(location)))
    }
}

/// HTTP client with retry
pub struct Downloader {
    client: Client,
    config: HttpConfig,
}

impl Downloader {
    pub fn new(config: HttpConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET a JSON document, retrying transient failures
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.with_retry(url, || async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok(response.json::<T>().await?)
        })
        .await
    }

    /// Place a decompressed copy of `location` at `dest`, returning the bytes written
    pub async fn fetch_to(&self, location: &str, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match Source::parse(location)? {
            Source::Remote(url) => {
                let raw = partial_path(dest);
                info!(url = %url, dest = %dest.display(), "Downloading");

                let downloaded = self.with_retry(&url, || self.download_once(&url, &raw)).await;
                let written = match downloaded {
                    Ok(()) => unpack(raw.clone(), dest.to_path_buf(), url.clone()).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = tokio::fs::remove_file(&raw).await {
                    debug!(path = %raw.display(), error = %e, "No partial download to remove");
                }
                written
            },
            Source::Local(path) => {
                if !path.exists() {
                    return Err(IngestError::NotFound(path.display().to_string()));
                }
                debug!(src = %path.display(), dest = %dest.display(), "Copying local input");
                let label = path.display().to_string();
                unpack(path, dest.to_path_buf(), label).await
            },
        }
    }

    async fn download_once(&self, url: &str, raw: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?;
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(IngestError::NotFound(url.to_string()));
        }
        let response = response.error_for_status()?;

        let mut file = tokio::fs::File::create(raw).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.max_retries;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts || !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(target_url = %what, attempt, attempts, error = %e, "Request failed, retrying");
                    let backoff = self.config.retry_backoff_secs * u64::from(attempt);
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                },
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Decompress (or copy) `raw` into `dest` off the async runtime
async fn unpack(raw: PathBuf, dest: PathBuf, label: String) -> Result<u64> {
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut reader = tracker_common::io::open_reader(&raw)?;
        let mut out = BufWriter::new(std::fs::File::create(&dest)?);
        let written = std::io::copy(&mut reader, &mut out)?;
        out.flush()?;

        if written == 0 {
            return Err(IngestError::EmptyInput(label));
        }
        Ok(written)
    })
    .await?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn test_source_parse() {
        assert_eq!(
            Source::parse("https://x.org/a.gff3.gz").unwrap(),
            Source::Remote("https://x.org/a.gff3.gz".to_string())
        );
        assert_eq!(
            Source::parse("file:///data/a.gff3").unwrap(),
            Source::Local(PathBuf::from("/data/a.gff3"))
        );
        assert_eq!(
            Source::parse(" data/a.fna ").unwrap(),
            Source::Local(PathBuf::from("data/a.fna"))
        );
        assert!(matches!(
            Source::parse("ftp://ftp.ncbi.nlm.nih.gov/x"),
            Err(IngestError::UnsupportedSource(_))
        ));
        assert!(Source::parse("  ").unwrap_err().is_missing_input());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/w/g1/annotation.gff3")),
            PathBuf::from("/w/g1/annotation.gff3.part")
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(HttpConfig::default().validate().is_ok());
        let config = HttpConfig {
            max_retries: 0,
            ..HttpConfig::default()
        };
        assert!(Downloader::new(config).is_err());
    }

    #[tokio::test]
    async fn test_fetch_local_gzip_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("genome.fna.gz");
        let mut encoder = GzEncoder::new(std::fs::File::create(&src).unwrap(), Compression::fast());
        encoder.write_all(b">chr1\nACGT\n").unwrap();
        encoder.finish().unwrap();

        let dest = dir.path().join("work/genome.fna");
        let downloader = Downloader::new(HttpConfig::default()).unwrap();
        let written = downloader
            .fetch_to(src.to_str().unwrap(), &dest)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), ">chr1\nACGT\n");
    }

    #[tokio::test]
    async fn test_fetch_local_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(HttpConfig::default()).unwrap();

        let missing = downloader
            .fetch_to("/no/such/file.gff3", &dir.path().join("a.gff3"))
            .await
            .unwrap_err();
        assert!(missing.is_missing_input());

        let empty = dir.path().join("empty.gff3");
        std::fs::write(&empty, "").unwrap();
        let err = downloader
            .fetch_to(empty.to_str().unwrap(), &dir.path().join("b.gff3"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptyInput(_)));
    }
}
