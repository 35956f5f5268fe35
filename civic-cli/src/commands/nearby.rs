//! Nearby command implementation.

use std::path::Path;

use anyhow::Result;
use civic_core::{Coordinate, LocationQuery, SimilarityRanker};
use colored::Colorize;

use crate::exit_codes::SUCCESS;
use crate::utils::{self, Output};

/// Execute the nearby command.
pub fn execute(center: Coordinate, params: LocationQuery, records: &Path, out: Output) -> Result<i32> {
    let store = utils::load_store(records)?;
    let results = SimilarityRanker::new(&store).search_by_location(center, &params)?;

    out.emit_json(&results)?;
    if out.human() {
        if results.is_empty() {
            println!(
                "{}",
                format!("No records within {} m", params.max_distance_m).yellow()
            );
        }
        for record in &results {
            let issue = record
                .case
                .as_ref()
                .map(|c| c.issue_type.as_str())
                .unwrap_or("-");
            println!(
                "{:>10}  {} {}  {}  {}",
                utils::format_distance(Some(record.distance_meters)),
                "record".dimmed(),
                record.record_id.to_string().bold(),
                issue.cyan(),
                utils::format_timestamp(&record.created_at).dimmed()
            );
        }
    }

    Ok(SUCCESS)
}
