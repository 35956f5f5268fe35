//! Exploratory similarity and proximity search.
//!
//! Unlike the duplicate detector this never rejects anything: it returns
//! ranked lists for reviewers, with a looser default Hamming threshold.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{
    EngineConfig, DEFAULT_LOCATION_SEARCH_DISTANCE_M, DEFAULT_LOCATION_SEARCH_LIMIT,
    DEFAULT_SIMILARITY_HASH_THRESHOLD, DEFAULT_SIMILARITY_LIMIT,
};
use crate::error::Result;
use crate::filter;
use crate::fingerprint::Fingerprint;
use crate::geo::{bounding_box, distance_meters, round_meters, usable, Coordinate};
use crate::record::{CaseInfo, MediaRecord, RecordLookup};
use crate::routing::normalize_issue_label;

/// Parameters of a ranked similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub coordinate: Option<Coordinate>,
    pub max_distance_m: Option<f64>,
    pub hash_threshold: u32,
    pub limit: usize,
    pub exclude_id: Option<i64>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            coordinate: None,
            max_distance_m: None,
            hash_threshold: DEFAULT_SIMILARITY_HASH_THRESHOLD,
            limit: DEFAULT_SIMILARITY_LIMIT,
            exclude_id: None,
        }
    }
}

impl From<&EngineConfig> for SearchQuery {
    fn from(config: &EngineConfig) -> Self {
        Self {
            hash_threshold: config.similarity_hash_threshold,
            limit: config.similarity_limit,
            ..Self::default()
        }
    }
}

/// Parameters of a location-only search.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationQuery {
    pub max_distance_m: f64,
    /// Only keep records whose sub-case has this issue label.
    pub issue_type: Option<String>,
    pub limit: usize,
}

impl Default for LocationQuery {
    fn default() -> Self {
        Self {
            max_distance_m: DEFAULT_LOCATION_SEARCH_DISTANCE_M,
            issue_type: None,
            limit: DEFAULT_LOCATION_SEARCH_LIMIT,
        }
    }
}

impl From<&EngineConfig> for LocationQuery {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_distance_m: config.location_search_distance_m,
            issue_type: None,
            limit: config.location_search_limit,
        }
    }
}

/// One ranked similarity hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarRecord {
    pub record_id: i64,
    pub sub_case_id: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hamming_distance: u32,
    /// `max(0, 100 - hamming * 10)`; display only.
    pub similarity_score: u32,
    pub distance_meters: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub case: Option<CaseInfo>,
}

/// One record found near a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRecord {
    pub record_id: i64,
    pub sub_case_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub case: Option<CaseInfo>,
}

/// One sub-case matching an issue-type search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCaseMatch {
    pub case: CaseInfo,
    /// Distance to the sub-case's closest qualifying record.
    pub distance_meters: Option<f64>,
    pub record_count: usize,
}

/// Display score for a Hamming distance.
pub fn similarity_score(hamming_distance: u32) -> u32 {
    100u32.saturating_sub(hamming_distance.saturating_mul(10))
}

/// A similarity hit before case enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate<'a> {
    pub record: &'a MediaRecord,
    pub hamming_distance: u32,
    pub distance_meters: Option<f64>,
}

/// Rank `records` by similarity to `query`. Pure.
///
/// Sorted ascending by `(hamming, distance)` when a usable coordinate is
/// given (records without a distance last), else by Hamming alone. The sort
/// is stable over id order, so ties resolve by ascending id.
pub fn rank_similar<'a>(
    query: &Fingerprint,
    records: &'a [MediaRecord],
    params: &SearchQuery,
) -> Vec<RankedCandidate<'a>> {
    let location = usable(params.coordinate);
    let radius = location.and(params.max_distance_m);

    let mut ranked: Vec<RankedCandidate<'a>> = filter::narrow(records, location, radius)
        .into_iter()
        .filter(|r| Some(r.id) != params.exclude_id)
        .filter_map(|candidate| {
            let stored = candidate.fingerprint.as_ref()?;
            let hamming = match query.hamming_distance(stored) {
                Ok(h) => h,
                Err(e) => {
                    warn!(record_id = candidate.id, error = %e, "Skipping record with incomparable fingerprint");
                    return None;
                }
            };
            if hamming > params.hash_threshold {
                return None;
            }

            let distance = match (location, usable(candidate.coordinate())) {
                (Some(a), Some(b)) => Some(distance_meters(a, b)),
                _ => None,
            };
            if let (Some(d), Some(max)) = (distance, params.max_distance_m) {
                if d > max {
                    return None;
                }
            }

            Some(RankedCandidate {
                record: candidate,
                hamming_distance: hamming,
                distance_meters: distance,
            })
        })
        .collect();

    if location.is_some() {
        ranked.sort_by(|a, b| {
            a.hamming_distance.cmp(&b.hamming_distance).then_with(|| {
                let da = a.distance_meters.unwrap_or(f64::INFINITY);
                let db = b.distance_meters.unwrap_or(f64::INFINITY);
                da.total_cmp(&db)
            })
        });
    } else {
        ranked.sort_by_key(|c| c.hamming_distance);
    }

    ranked.truncate(params.limit);
    ranked
}

/// Search front end bound to a record lookup.
pub struct SimilarityRanker<'a, L: RecordLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: RecordLookup + ?Sized> SimilarityRanker<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// Ranked list of stored records similar to `query`.
    pub fn search(&self, query: &Fingerprint, params: &SearchQuery) -> Result<Vec<SimilarRecord>> {
        let bbox = match (usable(params.coordinate), params.max_distance_m) {
            (Some(center), Some(radius)) => Some(bounding_box(center, radius)),
            _ => None,
        };
        let records = self.lookup.fetch_candidates(bbox.as_ref())?;
        let ranked = rank_similar(query, &records, params);

        debug!(
            fetched = records.len(),
            ranked = ranked.len(),
            hash_threshold = params.hash_threshold,
            "Similarity search complete"
        );

        let mut cases = CaseCache::new(self.lookup);
        ranked
            .into_iter()
            .map(|c| {
                Ok(SimilarRecord {
                    record_id: c.record.id,
                    sub_case_id: c.record.sub_case_id.clone(),
                    file_name: c.record.file_name.clone(),
                    content_type: c.record.content_type.clone(),
                    latitude: c.record.latitude,
                    longitude: c.record.longitude,
                    hamming_distance: c.hamming_distance,
                    similarity_score: similarity_score(c.hamming_distance),
                    distance_meters: c.distance_meters.map(round_meters),
                    created_at: c.record.created_at,
                    case: cases.get(&c.record.sub_case_id)?,
                })
            })
            .collect()
    }

    /// Records within `params.max_distance_m` of `center`, nearest first.
    ///
    /// Fingerprints play no part. A sentinel center yields no results.
    pub fn search_by_location(
        &self,
        center: Coordinate,
        params: &LocationQuery,
    ) -> Result<Vec<NearbyRecord>> {
        if !center.is_usable() {
            debug!("Location search with sentinel coordinate; nothing to search");
            return Ok(Vec::new());
        }

        let bbox = bounding_box(center, params.max_distance_m);
        let records = self.lookup.fetch_candidates(Some(&bbox))?;
        let wanted = params.issue_type.as_deref().map(normalize_issue_label);

        let mut cases = CaseCache::new(self.lookup);
        let mut results = Vec::new();
        for record in filter::within_box(&records, center, params.max_distance_m) {
            let Some(at) = record.coordinate() else {
                continue;
            };
            let distance = distance_meters(center, at);
            if distance > params.max_distance_m {
                continue;
            }

            let case = cases.get(&record.sub_case_id)?;
            if let Some(wanted) = &wanted {
                let matches = case
                    .as_ref()
                    .is_some_and(|c| &normalize_issue_label(&c.issue_type) == wanted);
                if !matches {
                    continue;
                }
            }

            results.push(NearbyRecord {
                record_id: record.id,
                sub_case_id: record.sub_case_id.clone(),
                latitude: at.latitude,
                longitude: at.longitude,
                distance_meters: distance,
                file_name: record.file_name.clone(),
                created_at: record.created_at,
                case,
            });
        }

        results.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        results.truncate(params.limit);
        for r in &mut results {
            r.distance_meters = round_meters(r.distance_meters);
        }
        Ok(results)
    }

    /// Sub-cases of one issue type, optionally near a location.
    ///
    /// Every known sub-case of the type is listed, including ones with no
    /// stored media (`record_count == 0`). With a usable coordinate and
    /// `max_distance_m`, sub-cases without any record inside the radius are
    /// dropped and the closest record's distance is reported. Sorted by
    /// distance (unknown last) when a coordinate is given, else by case id.
    pub fn search_by_issue_type(
        &self,
        issue_type: &str,
        coordinate: Option<Coordinate>,
        max_distance_m: Option<f64>,
        limit: usize,
    ) -> Result<Vec<IssueCaseMatch>> {
        let wanted = normalize_issue_label(issue_type);
        let location = usable(coordinate);
        let records = self.lookup.fetch_candidates(None)?;

        let mut by_sub_case: BTreeMap<&str, Vec<&MediaRecord>> = BTreeMap::new();
        for record in &records {
            by_sub_case
                .entry(record.sub_case_id.as_str())
                .or_default()
                .push(record);
        }

        let mut cases: Vec<CaseInfo> = self
            .lookup
            .fetch_cases()?
            .into_iter()
            .filter(|c| normalize_issue_label(&c.issue_type) == wanted)
            .collect();
        cases.sort_by(|a, b| (&a.case_id, &a.sub_case_id).cmp(&(&b.case_id, &b.sub_case_id)));

        let mut results = Vec::new();
        for case in cases {
            let members = by_sub_case
                .get(case.sub_case_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            let closest = location.and_then(|center| {
                members
                    .iter()
                    .filter_map(|r| usable(r.coordinate()))
                    .map(|at| distance_meters(center, at))
                    .min_by(|a, b| a.total_cmp(b))
            });
            if let (Some(_), Some(max)) = (location, max_distance_m) {
                if !closest.is_some_and(|d| d <= max) {
                    continue;
                }
            }
            let distance = closest;

            results.push(IssueCaseMatch {
                case,
                distance_meters: distance.map(round_meters),
                record_count: members.len(),
            });
        }

        if location.is_some() {
            results.sort_by(|a, b| {
                let da = a.distance_meters.unwrap_or(f64::INFINITY);
                let db = b.distance_meters.unwrap_or(f64::INFINITY);
                da.total_cmp(&db)
            });
        } else {
            results.sort_by(|a, b| a.case.case_id.cmp(&b.case.case_id));
        }
        results.truncate(limit);
        Ok(results)
    }
}

/// Per-call memo of case lookups.
struct CaseCache<'a, L: RecordLookup + ?Sized> {
    lookup: &'a L,
    seen: HashMap<String, Option<CaseInfo>>,
}

impl<'a, L: RecordLookup + ?Sized> CaseCache<'a, L> {
    fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, sub_case_id: &str) -> Result<Option<CaseInfo>> {
        if let Some(hit) = self.seen.get(sub_case_id) {
            return Ok(hit.clone());
        }
        let case = self.lookup.fetch_case_info(sub_case_id)?;
        self.seen.insert(sub_case_id.to_string(), case.clone());
        Ok(case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecordStore, RecordSnapshot};

    fn zeros() -> Fingerprint {
        Fingerprint::from_bytes(vec![0u8; 8]).unwrap()
    }

    /// Fingerprint at Hamming distance `bits` from `zeros()`.
    fn at_distance(bits: u32) -> Fingerprint {
        let mut bytes = vec![0u8; 8];
        for i in 0..bits as usize {
            bytes[i / 8] |= 1 << (i % 8);
        }
        Fingerprint::from_bytes(bytes).unwrap()
    }

    fn center() -> Coordinate {
        Coordinate::new(17.3850, 78.4867).unwrap()
    }

    fn north(meters: f64) -> Coordinate {
        Coordinate::new(17.3850 + meters / 111_194.93, 78.4867).unwrap()
    }

    fn record(id: i64, fp: Option<Fingerprint>, at: Option<Coordinate>, sub: &str) -> MediaRecord {
        MediaRecord {
            id,
            fingerprint: fp,
            latitude: at.map(|c| c.latitude),
            longitude: at.map(|c| c.longitude),
            sub_case_id: sub.into(),
            created_at: "2024-05-01T10:00:00Z".parse().unwrap(),
            file_name: Some(format!("img_{id}.jpg")),
            content_type: Some("image/jpeg".into()),
        }
    }

    fn case(sub: &str, case_id: &str, issue: &str) -> CaseInfo {
        CaseInfo {
            case_id: case_id.into(),
            sub_case_id: sub.into(),
            issue_type: issue.into(),
            authority: "Roads Department".into(),
            status: "open".into(),
        }
    }

    #[test]
    fn test_similarity_score() {
        assert_eq!(similarity_score(0), 100);
        assert_eq!(similarity_score(3), 70);
        assert_eq!(similarity_score(10), 0);
        assert_eq!(similarity_score(40), 0);
    }

    #[test]
    fn test_hash_threshold_boundary() {
        let records = vec![
            record(1, Some(at_distance(11)), None, "SUB-1"),
            record(2, Some(at_distance(10)), None, "SUB-2"),
        ];
        let store = MemoryRecordStore::from_snapshot(RecordSnapshot {
            records,
            cases: vec![],
        });
        let results = SimilarityRanker::new(&store)
            .search(&zeros(), &SearchQuery::default())
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record_id, 2);
        assert_eq!(results[0].hamming_distance, 10);
        assert_eq!(results[0].similarity_score, 0);
    }

    #[test]
    fn test_rank_without_location_by_hamming_then_id() {
        let records = vec![
            record(5, Some(at_distance(2)), None, "SUB-5"),
            record(3, Some(at_distance(4)), None, "SUB-3"),
            record(1, Some(at_distance(2)), None, "SUB-1"),
            record(2, None, None, "SUB-2"),
        ];
        let ranked = rank_similar(&zeros(), &records, &SearchQuery::default());
        let ids: Vec<i64> = ranked.iter().map(|c| c.record.id).collect();
        assert_eq!(ids, vec![1, 5, 3]);
    }

    #[test]
    fn test_rank_with_location_breaks_ties_by_distance() {
        let records = vec![
            record(1, Some(at_distance(1)), Some(north(300.0)), "SUB-1"),
            record(2, Some(at_distance(1)), Some(north(20.0)), "SUB-2"),
            record(3, Some(at_distance(1)), None, "SUB-3"),
            record(4, Some(at_distance(0)), Some(north(900.0)), "SUB-4"),
        ];
        let params = SearchQuery {
            coordinate: Some(center()),
            ..SearchQuery::default()
        };
        let ranked = rank_similar(&zeros(), &records, &params);
        let ids: Vec<i64> = ranked.iter().map(|c| c.record.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_rank_max_distance_and_exclude() {
        let records = vec![
            record(1, Some(zeros()), Some(north(100.0)), "SUB-1"),
            record(2, Some(zeros()), Some(north(600.0)), "SUB-2"),
            record(3, Some(zeros()), Some(north(10.0)), "SUB-3"),
        ];
        let params = SearchQuery {
            coordinate: Some(center()),
            max_distance_m: Some(500.0),
            exclude_id: Some(3),
            ..SearchQuery::default()
        };
        let ranked = rank_similar(&zeros(), &records, &params);
        let ids: Vec<i64> = ranked.iter().map(|c| c.record.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_rank_limit_truncates() {
        let records: Vec<_> = (1..=30)
            .map(|id| record(id, Some(zeros()), None, "SUB-X"))
            .collect();
        let params = SearchQuery {
            limit: 5,
            ..SearchQuery::default()
        };
        let ranked = rank_similar(&zeros(), &records, &params);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].record.id, 1);
    }

    #[test]
    fn test_search_enriches_with_case() {
        let store = MemoryRecordStore::from_snapshot(RecordSnapshot {
            records: vec![record(1, Some(zeros()), Some(north(40.0)), "SUB-1")],
            cases: vec![case("SUB-1", "MDMS-AAAA0001", "pathholes")],
        });
        let params = SearchQuery {
            coordinate: Some(center()),
            max_distance_m: Some(100.0),
            ..SearchQuery::default()
        };
        let results = SimilarityRanker::new(&store).search(&zeros(), &params).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].case.as_ref().unwrap().case_id, "MDMS-AAAA0001");
        assert_eq!(results[0].distance_meters, Some(40.0));
    }

    #[test]
    fn test_search_by_location_sorted_and_filtered() {
        let store = MemoryRecordStore::from_snapshot(RecordSnapshot {
            records: vec![
                record(1, None, Some(north(800.0)), "SUB-1"),
                record(2, Some(zeros()), Some(north(100.0)), "SUB-2"),
                record(3, None, Some(north(1500.0)), "SUB-1"),
                record(4, None, None, "SUB-2"),
                record(5, None, Some(north(300.0)), "SUB-3"),
            ],
            cases: vec![
                case("SUB-1", "MDMS-1", "pathholes"),
                case("SUB-2", "MDMS-2", "garbage"),
            ],
        });
        let ranker = SimilarityRanker::new(&store);

        let all = ranker
            .search_by_location(center(), &LocationQuery::default())
            .unwrap();
        let ids: Vec<i64> = all.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![2, 5, 1]);
        assert_eq!(all[0].distance_meters, 100.0);

        let potholes = ranker
            .search_by_location(
                center(),
                &LocationQuery {
                    issue_type: Some("Path_Holes".into()),
                    ..LocationQuery::default()
                },
            )
            .unwrap();
        let ids: Vec<i64> = potholes.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_search_by_location_sentinel_is_empty() {
        let store = MemoryRecordStore::from_snapshot(RecordSnapshot {
            records: vec![record(1, None, Some(Coordinate::new(0.0, 0.0).unwrap()), "SUB-1")],
            cases: vec![],
        });
        let out = SimilarityRanker::new(&store)
            .search_by_location(Coordinate::new(0.0, 0.0).unwrap(), &LocationQuery::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_search_by_issue_type() {
        let store = MemoryRecordStore::from_snapshot(RecordSnapshot {
            records: vec![
                record(1, None, Some(north(700.0)), "SUB-A"),
                record(2, None, Some(north(50.0)), "SUB-B"),
                record(3, None, Some(north(3000.0)), "SUB-C"),
                record(4, None, Some(north(200.0)), "SUB-A"),
                record(5, None, Some(north(10.0)), "SUB-D"),
            ],
            cases: vec![
                case("SUB-A", "MDMS-A", "pathholes"),
                case("SUB-B", "MDMS-B", "pathholes"),
                case("SUB-C", "MDMS-C", "pathholes"),
                case("SUB-D", "MDMS-D", "garbage"),
                case("SUB-E", "MDMS-E", "Potholes"),
            ],
        });
        let ranker = SimilarityRanker::new(&store);

        let near = ranker
            .search_by_issue_type("pothole", Some(center()), Some(1000.0), 50)
            .unwrap();
        let ids: Vec<&str> = near.iter().map(|m| m.case.case_id.as_str()).collect();
        assert_eq!(ids, vec!["MDMS-B", "MDMS-A"]);
        assert_eq!(near[1].distance_meters, Some(200.0));
        assert_eq!(near[1].record_count, 2);

        let anywhere = ranker.search_by_issue_type("pathholes", None, None, 50).unwrap();
        let ids: Vec<&str> = anywhere.iter().map(|m| m.case.case_id.as_str()).collect();
        assert_eq!(ids, vec!["MDMS-A", "MDMS-B", "MDMS-C", "MDMS-E"]);
        assert!(anywhere.iter().all(|m| m.distance_meters.is_none()));
        assert_eq!(anywhere[3].record_count, 0);
    }

    #[test]
    fn test_search_by_issue_type_lists_cases_without_media() {
        let store = MemoryRecordStore::from_snapshot(RecordSnapshot {
            records: vec![],
            cases: vec![case("SUB-1", "MDMS-1", "garbage")],
        });
        let ranker = SimilarityRanker::new(&store);

        let all = ranker.search_by_issue_type("garbage", None, None, 50).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record_count, 0);
        assert_eq!(all[0].distance_meters, None);

        // A radius filter needs at least one record inside it.
        let near = ranker
            .search_by_issue_type("garbage", Some(center()), Some(1000.0), 50)
            .unwrap();
        assert!(near.is_empty());
    }
}
