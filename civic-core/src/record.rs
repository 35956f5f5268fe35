//! Stored media records and the storage collaborator interface.
//!
//! The engine never owns storage. It reads a candidate snapshot through
//! [`RecordLookup`] and resolves case details for human-facing messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::geo::{BoundingBox, Coordinate};

/// Kind of submitted media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    /// Classify from a MIME content type.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A previously accepted piece of complaint media, as held by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    /// Perceptual fingerprint; records without one never take part in
    /// duplicate checks.
    #[serde(default)]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Owning sub-case (one issue type under one location case).
    pub sub_case_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl MediaRecord {
    /// The record's location, present only when both parts are stored.
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.latitude, self.longitude)
    }
}

/// Case details used to enrich verdicts and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInfo {
    pub case_id: String,
    pub sub_case_id: String,
    pub issue_type: String,
    pub authority: String,
    pub status: String,
}

/// Read access to stored media records.
///
/// Implementations must be thread-safe (`Send + Sync`). Each call should
/// return a consistent snapshot; serializing check-then-insert across
/// concurrent writers is the implementation's responsibility.
pub trait RecordLookup: Send + Sync {
    /// Fetch candidate records, optionally restricted to a bounding box.
    ///
    /// With a box, only records whose coordinate lies inside it are expected;
    /// without one, every record. Callers re-filter, so returning a superset
    /// is allowed.
    fn fetch_candidates(&self, bbox: Option<&BoundingBox>) -> Result<Vec<MediaRecord>>;

    /// Resolve the case a sub-case belongs to, if known.
    fn fetch_case_info(&self, sub_case_id: &str) -> Result<Option<CaseInfo>>;

    /// Every known sub-case, including those with no stored media yet.
    fn fetch_cases(&self) -> Result<Vec<CaseInfo>>;
}
