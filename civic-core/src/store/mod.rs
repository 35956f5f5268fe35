//! Record storage backends.
//!
//! The engine only needs [`RecordLookup`](crate::record::RecordLookup). This
//! module provides an in-memory implementation backed by a JSON snapshot,
//! used by the CLI and as a test fixture.

mod memory;

pub use memory::{IngestOutcome, MemoryRecordStore, NewMedia};

use serde::{Deserialize, Serialize};

use crate::record::{CaseInfo, MediaRecord};

/// Serializable contents of a record store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub records: Vec<MediaRecord>,
    #[serde(default)]
    pub cases: Vec<CaseInfo>,
}

impl RecordSnapshot {
    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Next free record id.
    pub fn next_record_id(&self) -> i64 {
        self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    /// Case details for a sub-case, if present.
    pub fn case_for(&self, sub_case_id: &str) -> Option<&CaseInfo> {
        self.cases.iter().find(|c| c.sub_case_id == sub_case_id)
    }
}
