//! BUSCO Tracker CLI - Main entry point

use clap::Parser;
use std::process;
use tracing::error;
use tracker_cli::commands::batch::BatchArgs;
use tracker_cli::{Cli, Commands};
use tracker_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    // Console logging goes to stderr; stdout carries command output
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("busco-tracker")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    // CLI should work without logging
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> tracker_cli::Result<()> {
    use tracker_cli::commands;

    match cli.command {
        Commands::Select {
            annotation,
            proteins,
            output,
        } => commands::select::run(&annotation, &proteins, output.as_deref()).await,

        Commands::Pending {
            registry,
            results,
            errors,
            order,
            chunk_index,
            chunk_count,
        } => {
            let chunk = chunk_index.zip(chunk_count);
            commands::pending::run(&registry, &results, &errors, order, chunk).await
        },

        Commands::Matrix {
            registry,
            results,
            errors,
            max_chunks,
            max_per_job,
        } => commands::matrix::run(&registry, &results, &errors, max_chunks, max_per_job).await,

        Commands::Batch {
            registry,
            results,
            errors,
            chunk_index,
            chunk_count,
            output_dir,
            max_per_job,
            order,
            tools,
        } => {
            let args = BatchArgs {
                registry,
                results,
                errors,
                chunk_index,
                chunk_count,
                output_dir,
                max_per_job,
                order,
            };
            commands::batch::run(args, &tools).await
        },

        Commands::Analyze {
            annotation,
            assembly,
            annotation_id,
            output_dir,
            tools,
        } => commands::analyze::run(&annotation, &assembly, &annotation_id, &output_dir, &tools).await,

        Commands::Aggregate {
            fragments_dir,
            results,
            errors,
        } => commands::aggregate::run(&fragments_dir, &results, &errors).await,

        Commands::Fetch { registry, api_url } => {
            commands::fetch::run(&registry, api_url.as_deref()).await
        },
    }
}
