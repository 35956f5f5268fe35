//! Cases command implementation.

use std::path::Path;

use anyhow::Result;
use civic_core::{Coordinate, SimilarityRanker};
use colored::Colorize;

use crate::exit_codes::SUCCESS;
use crate::utils::{self, Output};

/// Execute the cases command.
pub fn execute(
    issue_type: &str,
    coordinate: Option<Coordinate>,
    max_distance: Option<f64>,
    limit: usize,
    records: &Path,
    out: Output,
) -> Result<i32> {
    let store = utils::load_store(records)?;
    let matches = SimilarityRanker::new(&store).search_by_issue_type(
        issue_type,
        coordinate,
        max_distance,
        limit,
    )?;

    out.emit_json(&matches)?;
    if out.human() {
        if matches.is_empty() {
            println!("{}", format!("No {} cases found", issue_type).yellow());
        }
        for m in &matches {
            println!(
                "{}  {}  {}  {} media  {}",
                m.case.case_id.bold(),
                m.case.authority,
                m.case.status.cyan(),
                m.record_count,
                utils::format_distance(m.distance_meters).dimmed()
            );
        }
    }

    Ok(SUCCESS)
}
