//! In-memory record store
//!
//! Thread-safe storage over a [`RecordSnapshot`]. Reads take a shared lock;
//! [`MemoryRecordStore::ingest`] holds the write lock across the duplicate
//! check and the insert, so two concurrent submissions that duplicate each
//! other can never both be accepted.

use std::io::Write;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::RecordSnapshot;
use crate::detector::{duplicate_reason, find_duplicate, DuplicatePolicy, DuplicateVerdict, MatchedRecord};
use crate::error::{CivicError, Result};
use crate::fingerprint::Fingerprint;
use crate::geo::{round_meters, Coordinate};
use crate::record::{CaseInfo, MediaRecord, RecordLookup};

/// Descriptor for media being ingested.
#[derive(Debug, Clone, Default)]
pub struct NewMedia {
    pub sub_case_id: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Result of an atomic check-then-insert.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Stored under a fresh id.
    Accepted(MediaRecord),
    /// Matched an existing record; nothing stored.
    Rejected(DuplicateVerdict),
}

/// Thread-safe in-memory record store
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    snapshot: RwLock<RecordSnapshot>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RecordSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Load a store from a JSON snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CivicError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let snapshot = RecordSnapshot::from_json(&json)?;
        debug!(
            path = %path.display(),
            records = snapshot.records.len(),
            cases = snapshot.cases.len(),
            "Loaded record snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to a JSON snapshot file.
    ///
    /// The snapshot goes to a temporary file in the same directory which then
    /// replaces `path`, so readers never see a partially written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.read()?.to_json()?;
        let storage_err =
            |e: &dyn std::fmt::Display| CivicError::Storage(format!("Failed to write {}: {}", path.display(), e));

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| storage_err(&e))?;
        staged.write_all(json.as_bytes()).map_err(|e| storage_err(&e))?;
        staged.as_file().sync_all().map_err(|e| storage_err(&e))?;
        staged.persist(path).map_err(|e| storage_err(&e.error))?;

        debug!(path = %path.display(), bytes = json.len(), "Saved record snapshot");
        Ok(())
    }

    /// Clone the current contents.
    pub fn snapshot(&self) -> Result<RecordSnapshot> {
        Ok(self.read()?.clone())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Insert or replace case details.
    pub fn upsert_case(&self, case: CaseInfo) -> Result<()> {
        let mut snapshot = self.write()?;
        snapshot.cases.retain(|c| c.sub_case_id != case.sub_case_id);
        snapshot.cases.push(case);
        Ok(())
    }

    /// Check a fingerprint for duplicates and store it if novel, atomically.
    pub fn ingest(
        &self,
        fingerprint: Fingerprint,
        coordinate: Option<Coordinate>,
        media: NewMedia,
        policy: &DuplicatePolicy,
    ) -> Result<IngestOutcome> {
        let mut snapshot = self.write()?;

        if let Some(found) = find_duplicate(&fingerprint, coordinate, &snapshot.records, policy) {
            let case = snapshot.case_for(&found.record.sub_case_id).cloned();
            let verdict = DuplicateVerdict {
                is_duplicate: true,
                reason: Some(duplicate_reason(case.as_ref())),
                matched: Some(MatchedRecord {
                    id: found.record.id,
                    sub_case_id: found.record.sub_case_id.clone(),
                    latitude: found.record.latitude,
                    longitude: found.record.longitude,
                    distance_meters: found.distance_meters.map(round_meters),
                    hamming_distance: found.hamming_distance,
                    case,
                }),
            };
            return Ok(IngestOutcome::Rejected(verdict));
        }

        let location = coordinate.filter(Coordinate::is_usable);
        let record = MediaRecord {
            id: snapshot.next_record_id(),
            fingerprint: Some(fingerprint),
            latitude: location.map(|c| c.latitude),
            longitude: location.map(|c| c.longitude),
            sub_case_id: media.sub_case_id,
            created_at: Utc::now(),
            file_name: media.file_name,
            content_type: media.content_type,
        };
        snapshot.records.push(record.clone());

        info!(record_id = record.id, sub_case_id = %record.sub_case_id, "Stored media record");
        Ok(IngestOutcome::Accepted(record))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RecordSnapshot>> {
        self.snapshot
            .read()
            .map_err(|_| CivicError::Storage("record store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RecordSnapshot>> {
        self.snapshot
            .write()
            .map_err(|_| CivicError::Storage("record store lock poisoned".into()))
    }
}

impl RecordLookup for MemoryRecordStore {
    fn fetch_candidates(&self, bbox: Option<&crate::geo::BoundingBox>) -> Result<Vec<MediaRecord>> {
        let snapshot = self.read()?;
        let records = match bbox {
            Some(bbox) => snapshot
                .records
                .iter()
                .filter(|r| r.coordinate().is_some_and(|c| bbox.contains(c)))
                .cloned()
                .collect(),
            None => snapshot.records.clone(),
        };
        Ok(records)
    }

    fn fetch_case_info(&self, sub_case_id: &str) -> Result<Option<CaseInfo>> {
        Ok(self.read()?.case_for(sub_case_id).cloned())
    }

    fn fetch_cases(&self) -> Result<Vec<CaseInfo>> {
        Ok(self.read()?.cases.clone())
    }
}
