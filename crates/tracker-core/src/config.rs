//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracker_ingest::HttpConfig;

// ============================================================================
// Tool Configuration Constants
// ============================================================================

/// Default command used to run BUSCO.
pub const DEFAULT_BUSCO_COMMAND: &str = "busco";

/// Default command used to run gffread.
pub const DEFAULT_GFFREAD_COMMAND: &str = "gffread";

/// Default lineage dataset name.
pub const DEFAULT_BUSCO_LINEAGE: &str = "eukaryota_odb12";

/// Default location of the pre-downloaded lineage dataset.
pub const DEFAULT_BUSCO_LINEAGE_PATH: &str = "assets/busco_downloads/lineages/eukaryota_odb12";

/// Default BUSCO thread count.
pub const DEFAULT_BUSCO_CPU: u32 = 1;

// ============================================================================
// Workspace Configuration Constants
// ============================================================================

/// Default parent of per-annotation work directories.
pub const DEFAULT_WORK_DIR: &str = "work";

/// Default HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = tracker_ingest::download::DEFAULT_HTTP_TIMEOUT_SECS;

/// Default attempts per HTTP request.
pub const DEFAULT_MAX_RETRIES: u32 = tracker_ingest::download::DEFAULT_MAX_RETRIES;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub tools: ToolConfig,
    pub busco: BuscoConfig,
    pub work: WorkConfig,
    pub http: HttpSettings,
}

/// External tool commands, split on whitespace when run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub busco_command: String,
    pub gffread_command: String,
}

/// BUSCO assessment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuscoConfig {
    pub lineage: String,
    pub lineage_path: PathBuf,
    pub cpu: u32,
}

/// Scratch space settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkConfig {
    pub work_dir: PathBuf,
    /// Leave per-annotation work directories in place for debugging
    pub keep_work_dir: bool,
}

/// HTTP settings for downloads and registry refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub api_url: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl PipelineConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env();
        config.validate()?;

        Ok(config)
    }

    /// Build configuration from the current environment without validating
    pub fn from_env() -> Self {
        PipelineConfig {
            tools: ToolConfig {
                busco_command: env_string("BUSCO_COMMAND", DEFAULT_BUSCO_COMMAND),
                gffread_command: env_string("GFFREAD_COMMAND", DEFAULT_GFFREAD_COMMAND),
            },
            busco: BuscoConfig {
                lineage: env_string("BUSCO_LINEAGE", DEFAULT_BUSCO_LINEAGE),
                lineage_path: PathBuf::from(env_string(
                    "BUSCO_LINEAGE_PATH",
                    DEFAULT_BUSCO_LINEAGE_PATH,
                )),
                cpu: env_parse("BUSCO_CPU", DEFAULT_BUSCO_CPU),
            },
            work: WorkConfig {
                work_dir: PathBuf::from(env_string("TRACKER_WORK_DIR", DEFAULT_WORK_DIR)),
                keep_work_dir: env_flag("TRACKER_KEEP_WORK_DIR"),
            },
            http: HttpSettings {
                timeout_secs: env_parse("TRACKER_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
                max_retries: env_parse("TRACKER_MAX_RETRIES", DEFAULT_MAX_RETRIES),
                api_url: std::env::var("TRACKER_API_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tools.busco_command.trim().is_empty() {
            anyhow::bail!("BUSCO command cannot be empty");
        }

        if self.tools.gffread_command.trim().is_empty() {
            anyhow::bail!("gffread command cannot be empty");
        }

        if self.busco.lineage.trim().is_empty() {
            anyhow::bail!("BUSCO lineage cannot be empty");
        }

        if self.busco.cpu == 0 {
            anyhow::bail!("BUSCO cpu count must be greater than 0");
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("HTTP timeout must be greater than 0");
        }

        if self.http.max_retries == 0 {
            anyhow::bail!("HTTP max_retries must be at least 1");
        }

        // Checked per item so a missing dataset becomes an error record instead
        if !self.busco.lineage_path.is_dir() {
            tracing::warn!(
                path = %self.busco.lineage_path.display(),
                "Lineage directory not found - every assessment will fail"
            );
        }

        Ok(())
    }

    /// HTTP client settings for the downloader
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout_secs: self.http.timeout_secs,
            max_retries: self.http.max_retries,
            ..HttpConfig::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tools: ToolConfig {
                busco_command: DEFAULT_BUSCO_COMMAND.to_string(),
                gffread_command: DEFAULT_GFFREAD_COMMAND.to_string(),
            },
            busco: BuscoConfig {
                lineage: DEFAULT_BUSCO_LINEAGE.to_string(),
                lineage_path: PathBuf::from(DEFAULT_BUSCO_LINEAGE_PATH),
                cpu: DEFAULT_BUSCO_CPU,
            },
            work: WorkConfig {
                work_dir: PathBuf::from(DEFAULT_WORK_DIR),
                keep_work_dir: false,
            },
            http: HttpSettings {
                timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
                max_retries: DEFAULT_MAX_RETRIES,
                api_url: None,
            },
        }
    }
}
