//! End-to-end business-rule scenarios for duplicate detection, similarity
//! search and batch clustering, driven through the public API with real
//! encoded images.

use std::io::Cursor;

use civic_core::{
    compute, group_by_location, plan_batch, AuthorityMap, CaseInfo, Coordinate, DuplicateDetector,
    DuplicatePolicy, EngineConfig, Fingerprint, IngestOutcome, MemoryRecordStore, NewMedia,
    PrimaryIssue, SearchQuery, SimilarityRanker, SubmissionItem,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

const LAT: f64 = 12.9716;
const LON: f64 = 77.5946;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A point `meters` north of the reference location.
fn north(meters: f64) -> Coordinate {
    Coordinate::new(LAT + meters / 111_194.93, LON).unwrap()
}

/// 128x128 PNG of 16x16 tiles with pseudo-random brightness per `seed`.
fn photo(seed: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(128, 128, |x, y| {
        let tile = (y / 16) * 8 + (x / 16);
        let mut h = tile.wrapping_mul(2_654_435_761) ^ seed.wrapping_mul(97_531);
        h ^= h >> 13;
        h = h.wrapping_mul(0x5bd1_e995);
        h ^= h >> 15;
        Luma([(h & 0xFF) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding failed");
    out.into_inner()
}

/// Store with one record of `photo(1)` at the reference location.
fn store_with_one_record() -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    let fingerprint = compute(&photo(1)).expect("Failed to fingerprint stored photo");
    let outcome = store
        .ingest(
            fingerprint,
            Some(north(0.0)),
            NewMedia {
                sub_case_id: "SUB-4F2A9C".into(),
                file_name: Some("stored.png".into()),
                content_type: Some("image/png".into()),
            },
            &DuplicatePolicy::default(),
        )
        .expect("Ingest failed");
    assert!(matches!(outcome, IngestOutcome::Accepted(_)));
    store
        .upsert_case(CaseInfo {
            case_id: "MDMS-7D3E1B0A".into(),
            sub_case_id: "SUB-4F2A9C".into(),
            issue_type: "pathholes".into(),
            authority: "Roads Department".into(),
            status: "open".into(),
        })
        .expect("Case upsert failed");
    store
}

/// Fingerprint differing from `base` in exactly `bits` positions.
fn flip_bits(base: &Fingerprint, bits: usize) -> Fingerprint {
    let mut bytes = base.as_bytes().to_vec();
    for i in 0..bits {
        bytes[i / 8] ^= 1 << (i % 8);
    }
    Fingerprint::from_bytes(bytes).unwrap()
}

#[test]
fn scenario_same_image_same_coordinate_is_duplicate() {
    init_tracing();
    let store = store_with_one_record();

    let verdict = DuplicateDetector::new(&store)
        .check(&photo(1), Some(north(0.0)))
        .expect("Check failed");

    assert!(verdict.is_duplicate);
    assert_eq!(
        verdict.reason.as_deref(),
        Some("This complaint is already registered. Thanks for your concern. Ticket ID: MDMS-7D3E1B0A")
    );
    let matched = verdict.matched.expect("Matched record missing");
    assert_eq!(matched.id, 1);
    assert_eq!(matched.hamming_distance, 0);
    assert_eq!(matched.distance_meters, Some(0.0));
}

#[test]
fn scenario_same_image_200m_away_is_accepted() {
    let store = store_with_one_record();

    let verdict = DuplicateDetector::new(&store)
        .check(&photo(1), Some(north(200.0)))
        .expect("Check failed");

    assert!(!verdict.is_duplicate);
    assert!(verdict.reason.is_none());
}

#[test]
fn scenario_distinct_image_same_coordinate_is_accepted() {
    let store = store_with_one_record();
    let stored = compute(&photo(1)).unwrap();
    let distinct = flip_bits(&stored, 40);
    assert_eq!(stored.hamming_distance(&distinct).unwrap(), 40);

    let verdict = DuplicateDetector::new(&store)
        .check_fingerprint(&distinct, Some(north(0.0)))
        .expect("Check failed");

    assert!(!verdict.is_duplicate);
}

#[test]
fn scenario_distinct_photo_same_coordinate_is_accepted() {
    let store = store_with_one_record();

    let verdict = DuplicateDetector::new(&store)
        .check(&photo(2), Some(north(0.0)))
        .expect("Check failed");

    assert!(!verdict.is_duplicate);
}

#[test]
fn scenario_sentinel_coordinate_ignores_location() {
    let store = store_with_one_record();
    let sentinel = Coordinate::new(0.0, 0.0).unwrap();

    let verdict = DuplicateDetector::new(&store)
        .check(&photo(1), Some(sentinel))
        .expect("Check failed");

    assert!(verdict.is_duplicate);
    assert!(verdict.matched.unwrap().distance_meters.is_none());
}

#[test]
fn scenario_missing_coordinate_scans_full_corpus() {
    let store = store_with_one_record();

    let verdict = DuplicateDetector::new(&store)
        .check(&photo(1), None)
        .expect("Check failed");

    assert!(verdict.is_duplicate);
}

#[test]
fn scenario_five_items_two_clusters() {
    let items = vec![
        ("a", north(0.0)),
        ("b", north(8.0)),
        ("c", north(300.0)),
        ("d", north(-12.0)),
        ("e", north(310.0)),
    ];
    let items: Vec<SubmissionItem> = items
        .into_iter()
        .map(|(name, at)| SubmissionItem::new(name, "image/png", Vec::new()).with_coordinate(Some(at)))
        .collect();
    let clusters = group_by_location(items, 20.0);

    let names: Vec<Vec<String>> = clusters
        .iter()
        .map(|c| c.members().iter().map(|m| m.file_name.clone()).collect())
        .collect();
    assert_eq!(names, vec![vec!["a", "b", "d"], vec!["c", "e"]]);
}

#[test]
fn scenario_search_threshold_is_inclusive() {
    let store = MemoryRecordStore::new();
    let query = compute(&photo(3)).unwrap();
    let policy = DuplicatePolicy::default().with_hash_threshold(0);
    for (bits, sub) in [(11, "SUB-000011"), (10, "SUB-000010")] {
        store
            .ingest(
                flip_bits(&query, bits),
                Some(north(0.0)),
                NewMedia {
                    sub_case_id: sub.into(),
                    ..Default::default()
                },
                &policy,
            )
            .unwrap();
    }

    let results = SimilarityRanker::new(&store)
        .search(
            &query,
            &SearchQuery {
                hash_threshold: 10,
                ..SearchQuery::default()
            },
        )
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].sub_case_id, "SUB-000010");
    assert_eq!(results[0].hamming_distance, 10);
    assert_eq!(results[0].similarity_score, 0);
}

#[test]
fn scenario_check_is_idempotent() {
    let store = store_with_one_record();
    let detector = DuplicateDetector::new(&store);

    let first = detector.check(&photo(1), Some(north(5.0))).unwrap();
    let second = detector.check(&photo(1), Some(north(5.0))).unwrap();

    assert_eq!(first, second);
}

#[test]
fn scenario_batch_rejects_resubmitted_photo() {
    let store = store_with_one_record();
    let issue = Some(PrimaryIssue {
        label: "pothole".into(),
        confidence: 0.82,
    });
    let items = vec![
        SubmissionItem::new("again.png", "image/png", photo(1))
            .with_coordinate(Some(north(4.0)))
            .with_issue(issue.clone()),
        SubmissionItem::new("fresh.png", "image/png", photo(4))
            .with_coordinate(Some(north(6.0)))
            .with_issue(issue),
    ];

    let plan = plan_batch(items, &store, &AuthorityMap::default(), &EngineConfig::default())
        .expect("Planning failed");

    assert_eq!(plan.tickets.len(), 1);
    let ticket = &plan.tickets[0];
    assert_eq!(ticket.sub_tickets[0].issue_type, "pathholes");
    assert_eq!(ticket.sub_tickets[0].media[0].file_name, "fresh.png");
    assert_eq!(ticket.rejected[0].file_name, "again.png");
    assert!(ticket.rejected[0].message.contains("MDMS-7D3E1B0A"));
}
