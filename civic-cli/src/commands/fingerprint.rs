//! Fingerprint command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use civic_core::Fingerprint;
use colored::Colorize;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::debug;

use crate::exit_codes::SUCCESS;
use crate::utils::{self, Output};

#[derive(Debug, Serialize)]
struct FingerprintReport {
    file: String,
    fingerprint: Fingerprint,
    bits: usize,
}

/// Read and fingerprint one image; decoding runs on the blocking pool.
pub async fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let bytes = utils::read_media(path).await?;
    let fingerprint = tokio::task::spawn_blocking(move || civic_core::compute(&bytes))
        .await
        .context("Fingerprint task panicked")?
        .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
    debug!(path = %path.display(), fingerprint = %fingerprint, "Computed fingerprint");
    Ok(fingerprint)
}

/// Fingerprint `files` concurrently; output keeps argument order.
pub async fn fingerprint_files(files: Vec<PathBuf>) -> Result<Vec<(PathBuf, Fingerprint)>> {
    let mut tasks = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        tasks.spawn(async move {
            let fingerprint = fingerprint_file(&path).await?;
            anyhow::Ok((index, path, fingerprint))
        });
    }

    let mut done = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        done.push(joined.context("Fingerprint task panicked")??);
    }
    done.sort_by_key(|(index, _, _)| *index);
    Ok(done.into_iter().map(|(_, path, fp)| (path, fp)).collect())
}

/// Execute the fingerprint command.
pub async fn execute(files: Vec<PathBuf>, out: Output) -> Result<i32> {
    let results = fingerprint_files(files).await?;

    let reports: Vec<FingerprintReport> = results
        .into_iter()
        .map(|(path, fingerprint)| FingerprintReport {
            file: path.display().to_string(),
            bits: fingerprint.bit_len(),
            fingerprint,
        })
        .collect();

    out.emit_json(&reports)?;
    if out.human() {
        for report in &reports {
            println!("{}  {}", report.fingerprint.to_string().cyan(), report.file);
        }
    }

    Ok(SUCCESS)
}
