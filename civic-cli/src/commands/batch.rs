//! Batch command implementation.
//!
//! Reads every file concurrently, attaches location and detections from the
//! manifest, and prints the ticket plan. Nothing is written to the records
//! file; accepted media is stored with `ingest` once tickets exist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use civic_core::{
    plan_batch, primary_issue, AuthorityMap, BatchPlan, Coordinate, Detection, EngineConfig,
    SubmissionItem,
};
use colored::Colorize;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::exit_codes::SUCCESS;
use crate::utils::{self, Output};

/// Per-file metadata supplied alongside the media.
#[derive(Debug, Default, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Manifest keyed by file name.
pub type Manifest = BTreeMap<String, ManifestEntry>;

/// Build a submission item from file bytes and its manifest entry.
pub fn build_item(
    path: &Path,
    bytes: Vec<u8>,
    entry: Option<&ManifestEntry>,
    authorities: &AuthorityMap,
) -> Result<SubmissionItem> {
    let file_name = utils::file_name_of(path);
    let (coordinate, issue) = match entry {
        Some(entry) => {
            let coordinate = match (entry.latitude, entry.longitude) {
                (Some(lat), Some(lon)) => Some(
                    Coordinate::new(lat, lon)
                        .with_context(|| format!("Manifest entry for {}", file_name))?,
                ),
                _ => None,
            };
            (coordinate, primary_issue(&entry.detections, authorities))
        }
        None => {
            warn!(file = %file_name, "No manifest entry; item has no location or detections");
            (None, None)
        }
    };

    Ok(SubmissionItem::new(file_name, utils::content_type_for(path), bytes)
        .with_coordinate(coordinate)
        .with_issue(issue))
}

/// Execute the batch command.
pub async fn execute(
    files: Vec<PathBuf>,
    manifest: Option<PathBuf>,
    authorities: Option<PathBuf>,
    records: &Path,
    config: &EngineConfig,
    out: Output,
) -> Result<i32> {
    let manifest: Manifest = match &manifest {
        Some(path) => utils::read_json(path, "manifest").await?,
        None => Manifest::new(),
    };
    let authorities: AuthorityMap = match &authorities {
        Some(path) => utils::read_json(path, "authorities").await?,
        None => AuthorityMap::default(),
    };

    let mut tasks = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        tasks.spawn(async move {
            let bytes = utils::read_media(&path).await?;
            anyhow::Ok((index, path, bytes))
        });
    }
    let mut loaded = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        loaded.push(joined.context("Read task panicked")??);
    }
    loaded.sort_by_key(|(index, _, _)| *index);

    let items = loaded
        .into_iter()
        .map(|(_, path, bytes)| {
            let entry = manifest.get(&utils::file_name_of(&path));
            build_item(&path, bytes, entry, &authorities)
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(items = items.len(), "Built submission items");

    let store = utils::load_store(records)?;
    let plan = plan_batch(items, &store, &authorities, config)?;

    out.emit_json(&plan)?;
    if out.human() {
        print_plan(&plan);
    }

    Ok(SUCCESS)
}

fn print_plan(plan: &BatchPlan) {
    for (n, ticket) in plan.tickets.iter().enumerate() {
        println!();
        let cell = ticket.cell.as_deref().unwrap_or("no location");
        println!("{} {} {}", "Ticket".green().bold(), n + 1, format!("[{}]", cell).dimmed());
        for sub in &ticket.sub_tickets {
            println!("   {} -> {}", sub.issue_type.cyan(), sub.authority);
            for media in &sub.media {
                println!("      {} {}", "+".green(), media.file_name);
            }
        }
        for rejected in &ticket.rejected {
            println!("      {} {}: {}", "-".red(), rejected.file_name, rejected.message.dimmed());
        }
    }

    if !plan.rejected.is_empty() {
        println!();
        println!("{}", "Rejected".red().bold());
        for rejected in &plan.rejected {
            println!("   {} {}: {}", "-".red(), rejected.file_name, rejected.message.dimmed());
        }
    }

    println!();
    println!(
        "   {} {} accepted, {} rejected",
        "Summary:".dimmed(),
        plan.accepted_count(),
        plan.rejected_count()
    );
}
