//! `busco-tracker aggregate` command implementation

use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Merge fragments into the canonical tables
pub async fn run(fragments_dir: &Path, results: &Path, errors: &Path) -> Result<()> {
    let stats = tracker_core::aggregate(fragments_dir, results, errors)?;

    println!("{}", "Aggregation complete".cyan().bold());
    println!("  Fragments read:    {}", stats.fragments_read);
    if stats.fragments_skipped > 0 {
        println!(
            "  Fragments skipped: {}",
            stats.fragments_skipped.to_string().yellow()
        );
    }
    println!("  Results upserted:  {}", stats.results_upserted);
    println!("  Errors appended:   {}", stats.errors_appended);
    println!("  Result rows:       {}", stats.result_rows);
    println!("  Error rows:        {}", stats.error_rows);

    Ok(())
}
