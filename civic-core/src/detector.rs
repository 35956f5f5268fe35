//! Ingestion-time duplicate detection.
//!
//! Business rule:
//!
//! - same content + same location (within the distance threshold) → duplicate
//! - different content + same location → accept
//! - any content + different location → accept
//! - same content + unknown location on either side → still compared against
//!   the full corpus; location can only narrow the scan, never exempt from it
//!
//! The scan is first-match-wins over candidates in ascending record id order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, DEFAULT_DUPLICATE_DISTANCE_M, DEFAULT_DUPLICATE_HASH_THRESHOLD};
use crate::error::Result;
use crate::filter;
use crate::fingerprint::Fingerprint;
use crate::geo::{bounding_box, distance_meters, round_meters, usable, Coordinate};
use crate::record::{CaseInfo, MediaRecord, RecordLookup};

/// User-facing message for a rejected duplicate.
pub const DUPLICATE_MESSAGE: &str =
    "This complaint is already registered. Thanks for your concern.";

/// Thresholds applied by one duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePolicy {
    /// Maximum distance in meters to consider the same location.
    pub distance_threshold_m: f64,
    /// Maximum Hamming distance to consider the same content.
    pub hash_threshold: u32,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            distance_threshold_m: DEFAULT_DUPLICATE_DISTANCE_M,
            hash_threshold: DEFAULT_DUPLICATE_HASH_THRESHOLD,
        }
    }
}

impl From<&EngineConfig> for DuplicatePolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            distance_threshold_m: config.duplicate_distance_m,
            hash_threshold: config.duplicate_hash_threshold,
        }
    }
}

impl DuplicatePolicy {
    pub fn with_distance_threshold(mut self, meters: f64) -> Self {
        self.distance_threshold_m = meters;
        self
    }

    pub fn with_hash_threshold(mut self, bits: u32) -> Self {
        self.hash_threshold = bits;
        self
    }
}

/// The stored record a submission was matched against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRecord {
    pub id: i64,
    pub sub_case_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Exact distance rounded to 2 decimals, when both sides had a location.
    pub distance_meters: Option<f64>,
    pub hamming_distance: u32,
    /// Case details when the lookup could resolve them.
    pub case: Option<CaseInfo>,
}

/// Outcome of one duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub reason: Option<String>,
    pub matched: Option<MatchedRecord>,
}

impl DuplicateVerdict {
    /// Verdict for a submission with no matching record.
    pub fn novel() -> Self {
        Self {
            is_duplicate: false,
            reason: None,
            matched: None,
        }
    }

    pub fn should_accept(&self) -> bool {
        !self.is_duplicate
    }
}

/// A raw match produced by [`find_duplicate`], before case enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch<'a> {
    pub record: &'a MediaRecord,
    pub hamming_distance: u32,
    pub distance_meters: Option<f64>,
}

/// Scan `records` for the first duplicate of `query`.
///
/// Pure: no lookups, no I/O. A stored fingerprint of a different length is
/// logged and treated as "not similar" so one corrupt record cannot block
/// detection against the rest.
pub fn find_duplicate<'a>(
    query: &Fingerprint,
    coordinate: Option<Coordinate>,
    records: &'a [MediaRecord],
    policy: &DuplicatePolicy,
) -> Option<DuplicateMatch<'a>> {
    let location = usable(coordinate);
    let radius = location.map(|_| policy.distance_threshold_m);

    for candidate in filter::narrow(records, location, radius) {
        let mut distance = None;
        if let (Some(query_at), Some(candidate_at)) = (location, usable(candidate.coordinate())) {
            let d = distance_meters(query_at, candidate_at);
            if d > policy.distance_threshold_m {
                continue;
            }
            distance = Some(d);
        }

        let Some(stored) = candidate.fingerprint.as_ref() else {
            continue;
        };

        let hamming = match query.hamming_distance(stored) {
            Ok(h) => h,
            Err(e) => {
                warn!(record_id = candidate.id, error = %e, "Skipping record with incomparable fingerprint");
                continue;
            }
        };

        if hamming <= policy.hash_threshold {
            debug!(
                record_id = candidate.id,
                hamming,
                distance_m = ?distance,
                "Duplicate candidate matched"
            );
            return Some(DuplicateMatch {
                record: candidate,
                hamming_distance: hamming,
                distance_meters: distance,
            });
        }
    }

    None
}

/// Build the human-facing reason for a duplicate.
pub fn duplicate_reason(case: Option<&CaseInfo>) -> String {
    match case {
        Some(case) => format!("{} Ticket ID: {}", DUPLICATE_MESSAGE, case.case_id),
        None => DUPLICATE_MESSAGE.to_string(),
    }
}

/// Duplicate detector bound to a record lookup.
pub struct DuplicateDetector<'a, L: RecordLookup + ?Sized> {
    lookup: &'a L,
    policy: DuplicatePolicy,
}

impl<'a, L: RecordLookup + ?Sized> DuplicateDetector<'a, L> {
    /// Create a detector with the default policy (50 m, 5 bits).
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &DuplicatePolicy {
        &self.policy
    }

    /// Fingerprint `image_bytes` and check it against stored records.
    ///
    /// # Errors
    ///
    /// [`crate::CivicError::InvalidImage`] when the bytes cannot be decoded;
    /// storage errors from the lookup are surfaced unchanged.
    #[cfg(feature = "perceptual-hash")]
    pub fn check(&self, image_bytes: &[u8], coordinate: Option<Coordinate>) -> Result<DuplicateVerdict> {
        let fingerprint = crate::fingerprint::compute(image_bytes)?;
        self.check_fingerprint(&fingerprint, coordinate)
    }

    /// Check a precomputed fingerprint against stored records.
    pub fn check_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        coordinate: Option<Coordinate>,
    ) -> Result<DuplicateVerdict> {
        let bbox = usable(coordinate).map(|c| bounding_box(c, self.policy.distance_threshold_m));
        let records = self.lookup.fetch_candidates(bbox.as_ref())?;
        self.check_against(fingerprint, coordinate, &records)
    }

    /// Check a fingerprint against an explicit record set.
    ///
    /// The lookup is consulted only to resolve case details for a match.
    pub fn check_against(
        &self,
        fingerprint: &Fingerprint,
        coordinate: Option<Coordinate>,
        records: &[MediaRecord],
    ) -> Result<DuplicateVerdict> {
        let Some(found) = find_duplicate(fingerprint, coordinate, records, &self.policy) else {
            debug!(candidates = records.len(), "No duplicate found");
            return Ok(DuplicateVerdict::novel());
        };

        let case = self.lookup.fetch_case_info(&found.record.sub_case_id)?;
        let reason = duplicate_reason(case.as_ref());

        info!(
            record_id = found.record.id,
            sub_case_id = %found.record.sub_case_id,
            hamming = found.hamming_distance,
            distance_m = ?found.distance_meters,
            "Rejected duplicate submission"
        );

        Ok(DuplicateVerdict {
            is_duplicate: true,
            reason: Some(reason),
            matched: Some(MatchedRecord {
                id: found.record.id,
                sub_case_id: found.record.sub_case_id.clone(),
                latitude: found.record.latitude,
                longitude: found.record.longitude,
                distance_meters: found.distance_meters.map(round_meters),
                hamming_distance: found.hamming_distance,
                case,
            }),
        })
    }

    /// Accept/reject shorthand: `(should_accept, rejection_reason)`.
    #[cfg(feature = "perceptual-hash")]
    pub fn should_accept(
        &self,
        image_bytes: &[u8],
        coordinate: Option<Coordinate>,
    ) -> Result<(bool, Option<String>)> {
        let verdict = self.check(image_bytes, coordinate)?;
        Ok((verdict.should_accept(), verdict.reason))
    }
}
