//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod aggregate;
pub mod analyze;
pub mod batch;
pub mod fetch;
pub mod matrix;
pub mod pending;
pub mod select;

use crate::error::Result;
use crate::ToolArgs;
use tracker_core::PipelineConfig;

/// Load pipeline configuration from the environment, then apply flag overrides
pub(crate) fn pipeline_config(tools: &ToolArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load().map_err(|e| crate::CliError::config(format!("{e:#}")))?;
    tools.apply(&mut config);
    config
        .validate()
        .map_err(|e| crate::CliError::config(format!("{e:#}")))?;
    Ok(config)
}
