//! Search command implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use civic_core::{SearchQuery, SimilarityRanker};
use colored::Colorize;

use super::fingerprint::fingerprint_file;
use crate::exit_codes::SUCCESS;
use crate::utils::{self, Output};

/// Execute the search command.
pub async fn execute(file: PathBuf, params: SearchQuery, records: &Path, out: Output) -> Result<i32> {
    let fingerprint = fingerprint_file(&file).await?;
    let store = utils::load_store(records)?;
    let results = SimilarityRanker::new(&store).search(&fingerprint, &params)?;

    out.emit_json(&results)?;
    if out.human() {
        if results.is_empty() {
            println!("{}", "No similar records found".yellow());
        }
        for (rank, hit) in results.iter().enumerate() {
            println!(
                "{:>3}. {} {}  {}",
                rank + 1,
                "record".dimmed(),
                hit.record_id.to_string().bold(),
                format!("{}%", hit.similarity_score).cyan()
            );
            println!(
                "     {} {} bits  {} {}",
                "hamming:".dimmed(),
                hit.hamming_distance,
                "distance:".dimmed(),
                utils::format_distance(hit.distance_meters)
            );
            let case = hit
                .case
                .as_ref()
                .map(|c| format!("{} / {}", c.case_id, c.issue_type))
                .unwrap_or_else(|| hit.sub_case_id.clone());
            println!("     {} {}", "case:".dimmed(), case);
        }
    }

    Ok(SUCCESS)
}
