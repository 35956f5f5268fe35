//! Candidate narrowing before exact comparison.
//!
//! With a usable query location and a radius, only fingerprinted records
//! inside the radius' bounding box survive. Without a usable location every
//! fingerprinted record survives: missing GPS must never exempt a submission
//! from similarity checks.

use tracing::debug;

use crate::geo::{bounding_box, usable, Coordinate};
use crate::record::MediaRecord;

/// Narrow `records` to duplicate-check candidates, ordered by ascending id.
///
/// The id ordering makes "first match wins" scans reproducible regardless of
/// how storage returned the records.
pub fn narrow<'a>(
    records: &'a [MediaRecord],
    query: Option<Coordinate>,
    radius_meters: Option<f64>,
) -> Vec<&'a MediaRecord> {
    let bbox = match (usable(query), radius_meters) {
        (Some(center), Some(radius)) => Some(bounding_box(center, radius)),
        _ => None,
    };

    let mut candidates: Vec<&MediaRecord> = records
        .iter()
        .filter(|r| r.fingerprint.is_some())
        .filter(|r| match &bbox {
            Some(bbox) => r.coordinate().is_some_and(|c| bbox.contains(c)),
            None => true,
        })
        .collect();

    candidates.sort_by_key(|r| r.id);

    debug!(
        total = records.len(),
        candidates = candidates.len(),
        location_filtered = bbox.is_some(),
        "Narrowed candidate records"
    );

    candidates
}

/// Records within the bounding box regardless of fingerprint, ordered by id.
///
/// Used by location-only queries where image similarity plays no part.
pub fn within_box<'a>(
    records: &'a [MediaRecord],
    center: Coordinate,
    radius_meters: f64,
) -> Vec<&'a MediaRecord> {
    let bbox = bounding_box(center, radius_meters);
    let mut inside: Vec<&MediaRecord> = records
        .iter()
        .filter(|r| r.coordinate().is_some_and(|c| bbox.contains(c)))
        .collect();
    inside.sort_by_key(|r| r.id);
    inside
}
