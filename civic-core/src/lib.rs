//! Civic Core - duplicate detection and spatial similarity for complaint media
//!
//! This crate decides whether newly submitted civic-complaint media (photos of
//! potholes, garbage, open manholes...) is a near-duplicate of something
//! already on file, ranks similar stored media, and groups multi-file
//! submissions into location clusters before ticket creation.
//!
//! # Features
//!
//! - 64-bit blockhash perceptual fingerprints with Hamming-distance comparison
//! - Haversine distances and conservative bounding-box prefiltering
//! - Combined content + location duplicate rule, first match wins by record id
//! - Similarity and location search with stable ordering
//! - Greedy anchor-based clustering and batch intake planning
//!
//! Storage is a collaborator: the engine reads through [`RecordLookup`].
//! [`MemoryRecordStore`] is a thread-safe implementation with an atomic
//! check-then-insert.
//!
//! # Example
//!
//! ```no_run
//! use civic_core::{Coordinate, DuplicateDetector, MemoryRecordStore};
//!
//! # fn example(photo: &[u8]) -> civic_core::Result<()> {
//! let store = MemoryRecordStore::new();
//! let here = Coordinate::new(18.5204, 73.8567)?;
//!
//! let verdict = DuplicateDetector::new(&store).check(photo, Some(here))?;
//! if verdict.is_duplicate {
//!     println!("{}", verdict.reason.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod detector;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod geo;
#[cfg(feature = "perceptual-hash")]
pub mod intake;
pub mod ranker;
pub mod record;
pub mod routing;
pub mod store;

// Re-export main types for convenience
pub use cluster::{group_by_location, group_by_location_default, Located, LocationCluster, SubmissionItem};
pub use config::EngineConfig;
pub use detector::{DuplicateDetector, DuplicatePolicy, DuplicateVerdict, MatchedRecord, DUPLICATE_MESSAGE};
pub use error::{CivicError, Result};
pub use fingerprint::{hamming_distance, is_similar, Fingerprint};
pub use geo::{bounding_box, distance_meters, BoundingBox, Coordinate};
pub use ranker::{
    similarity_score, IssueCaseMatch, LocationQuery, NearbyRecord, SearchQuery, SimilarRecord,
    SimilarityRanker,
};
pub use record::{CaseInfo, MediaKind, MediaRecord, RecordLookup};
pub use routing::{normalize_issue_label, primary_issue, AuthorityMap, Detection, PrimaryIssue};
pub use store::{IngestOutcome, MemoryRecordStore, NewMedia, RecordSnapshot};

// Perceptual hashing exports
#[cfg(feature = "perceptual-hash")]
pub use fingerprint::{compute, FingerprintHasher, HashAlgorithm};

#[cfg(feature = "perceptual-hash")]
pub use intake::{
    plan_batch, BatchPlan, BatchPlanner, PlannedSubTicket, PlannedTicket, RejectedMedia,
    RejectionKind, NO_ISSUE_MESSAGE,
};
