//! `busco-tracker fetch` command implementation
//!
//! Appends annotations the API lists but the registry lacks.

use crate::error::{CliError, Result};
use colored::Colorize;
use std::path::Path;
use tracker_core::PipelineConfig;
use tracker_ingest::{registry, Downloader};

/// Refresh the registry from the annotation API
pub async fn run(registry_path: &Path, api_url: Option<&str>) -> Result<()> {
    let config = PipelineConfig::from_env();

    let url = api_url
        .map(str::to_string)
        .or_else(|| config.http.api_url.clone())
        .ok_or_else(|| CliError::usage("no annotation API URL; pass --api-url or set TRACKER_API_URL"))?;

    let downloader = Downloader::new(config.http_config())?;
    let stats = registry::refresh_registry(&downloader, &url, registry_path).await?;

    println!("{}", "Registry updated".cyan().bold());
    println!("  Existing: {}", stats.existing);
    println!("  Fetched:  {}", stats.fetched);
    println!("  Added:    {}", stats.added.to_string().green());
    println!("  Registry: {}", registry_path.display());

    Ok(())
}
