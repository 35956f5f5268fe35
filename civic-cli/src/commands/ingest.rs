//! Ingest command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use civic_core::{Coordinate, DuplicatePolicy, EngineConfig, IngestOutcome, NewMedia};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use super::fingerprint::fingerprint_file;
use crate::exit_codes::{DUPLICATE_FOUND, SUCCESS};
use crate::utils::{self, Output};

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
enum IngestReport<'a> {
    Accepted { record: &'a civic_core::MediaRecord },
    Rejected { verdict: &'a civic_core::DuplicateVerdict },
}

/// Execute the ingest command.
pub async fn execute(
    file: PathBuf,
    sub_case: String,
    coordinate: Option<Coordinate>,
    records: &Path,
    config: &EngineConfig,
    out: Output,
) -> Result<i32> {
    let content_type = utils::content_type_for(&file).to_string();
    let fingerprint = fingerprint_file(&file).await?;

    // Held until this function returns, covering load through save.
    let lock_target = records.to_path_buf();
    let _lock = tokio::task::spawn_blocking(move || utils::lock_records(&lock_target))
        .await
        .context("Lock task panicked")??;

    let store = utils::load_store(records)?;
    let media = NewMedia {
        sub_case_id: sub_case,
        file_name: Some(utils::file_name_of(&file)),
        content_type: Some(content_type),
    };
    let outcome = store.ingest(fingerprint, coordinate, media, &DuplicatePolicy::from(config))?;

    match &outcome {
        IngestOutcome::Accepted(record) => {
            utils::save_store(&store, records)?;
            info!(record_id = record.id, path = %records.display(), "Records saved");

            out.emit_json(&IngestReport::Accepted { record })?;
            if out.human() {
                println!();
                println!("{}", "Stored".green().bold());
                println!("   {} {}", "Record:".dimmed(), record.id);
                println!("   {} {}", "Sub-case:".dimmed(), record.sub_case_id);
                if let Some(fp) = &record.fingerprint {
                    println!("   {} {}", "Fingerprint:".dimmed(), fp);
                }
                println!("   {} {}", "Records file:".dimmed(), records.display());
            }
            Ok(SUCCESS)
        }
        IngestOutcome::Rejected(verdict) => {
            out.emit_json(&IngestReport::Rejected { verdict })?;
            if out.human() {
                println!();
                println!("{}", "Not stored: duplicate".red().bold());
                if let Some(reason) = &verdict.reason {
                    println!("   {} {}", "Reason:".dimmed(), reason);
                }
                if let Some(matched) = &verdict.matched {
                    println!("   {} {}", "Matches record:".dimmed(), matched.id);
                }
            }
            Ok(DUPLICATE_FOUND)
        }
    }
}
