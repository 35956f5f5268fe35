//! Common utility functions shared across CLI commands.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use civic_core::{Coordinate, MemoryRecordStore};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Whether human-readable text should be printed.
    pub fn human(&self) -> bool {
        !self.json && !self.quiet
    }

    /// Print `value` as pretty JSON when `--json` is set.
    pub fn emit_json<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
        }
        Ok(())
    }
}

/// Read a media file into memory.
pub async fn read_media(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

/// Read and parse a JSON input file; `what` names it in errors.
pub async fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}: {}", what, path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}: {}", what, path.display()))
}

/// Combine `--lat`/`--lon` into a coordinate.
pub fn coordinate_from_args(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinate>> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Some(Coordinate::new(lat, lon)?)),
        (None, None) => Ok(None),
        _ => bail!("--lat and --lon must be given together"),
    }
}

/// Load the records file; a missing file is an empty store.
pub fn load_store(path: &Path) -> Result<MemoryRecordStore> {
    if !path.exists() {
        debug!(path = %path.display(), "Records file not found, starting empty");
        return Ok(MemoryRecordStore::new());
    }
    MemoryRecordStore::load(path)
        .with_context(|| format!("Failed to read records: {}", path.display()))
}

/// Exclusive lock on a records file, released when dropped.
#[derive(Debug)]
pub struct RecordsLock {
    _file: File,
}

/// Sidecar lock file for a records file.
///
/// Saving replaces the records file, so the lock cannot live on it.
pub fn lock_path_for(records: &Path) -> PathBuf {
    let mut name = OsString::from(records.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Block until this process holds the records file's lock.
///
/// Hold the returned guard from loading the store until it is saved.
pub fn lock_records(records: &Path) -> Result<RecordsLock> {
    let lock_path = lock_path_for(records);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to write records lock: {}", lock_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("Failed to write records lock: {}", lock_path.display()))?;
    debug!(path = %lock_path.display(), "Acquired records lock");
    Ok(RecordsLock { _file: file })
}

/// Persist the store back to the records file.
pub fn save_store(store: &MemoryRecordStore, path: &Path) -> Result<()> {
    store
        .save(path)
        .with_context(|| format!("Failed to write records: {}", path.display()))
}

/// Guess a MIME content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// File name component of a path, falling back to the full path.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format an optional distance in meters.
pub fn format_distance(meters: Option<f64>) -> String {
    match meters {
        Some(m) => format!("{m:.2} m"),
        None => "unknown".to_string(),
    }
}
