//! Check command implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use civic_core::{Coordinate, DuplicateDetector, DuplicatePolicy, DuplicateVerdict, EngineConfig};
use colored::Colorize;
use tracing::info;

use super::fingerprint::fingerprint_file;
use crate::exit_codes::{DUPLICATE_FOUND, SUCCESS};
use crate::utils::{self, Output};

/// Execute the check command.
pub async fn execute(
    file: PathBuf,
    coordinate: Option<Coordinate>,
    records: &Path,
    config: &EngineConfig,
    out: Output,
) -> Result<i32> {
    let fingerprint = fingerprint_file(&file).await?;

    let store = utils::load_store(records)?;
    let verdict = DuplicateDetector::new(&store)
        .with_policy(DuplicatePolicy::from(config))
        .check_fingerprint(&fingerprint, coordinate)?;

    info!(
        path = %file.display(),
        duplicate = verdict.is_duplicate,
        "Duplicate check complete"
    );

    out.emit_json(&verdict)?;
    if out.human() {
        print_verdict(&verdict);
    }

    Ok(if verdict.is_duplicate {
        DUPLICATE_FOUND
    } else {
        SUCCESS
    })
}

fn print_verdict(verdict: &DuplicateVerdict) {
    println!();
    if !verdict.is_duplicate {
        println!("{}", "NOVEL".green().bold());
        println!("   {} {}", "Result:".dimmed(), "No matching record; accept".green());
        return;
    }

    println!("{}", "DUPLICATE".red().bold());
    if let Some(reason) = &verdict.reason {
        println!("   {} {}", "Reason:".dimmed(), reason);
    }
    if let Some(matched) = &verdict.matched {
        println!("   {} {}", "Record:".dimmed(), matched.id);
        println!("   {} {}", "Sub-case:".dimmed(), matched.sub_case_id);
        println!("   {} {} bits", "Hamming:".dimmed(), matched.hamming_distance);
        println!(
            "   {} {}",
            "Distance:".dimmed(),
            utils::format_distance(matched.distance_meters)
        );
        if let Some(case) = &matched.case {
            println!("   {} {} ({})", "Authority:".dimmed(), case.authority, case.status);
        }
    }
}
