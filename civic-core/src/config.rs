//! Engine policy configuration
//!
//! Thresholds are policy inputs, not constants of the algorithms. Defaults
//! match the municipal deployment; every value can be overridden from the
//! environment or per call.

/// Default distance for the ingestion duplicate check (meters).
pub const DEFAULT_DUPLICATE_DISTANCE_M: f64 = 50.0;
/// Default Hamming threshold for the ingestion duplicate check.
pub const DEFAULT_DUPLICATE_HASH_THRESHOLD: u32 = 5;
/// Default anchor radius for batch clustering (meters).
pub const DEFAULT_CLUSTER_DISTANCE_M: f64 = 20.0;
/// Default radius for location-only searches (meters).
pub const DEFAULT_LOCATION_SEARCH_DISTANCE_M: f64 = 1000.0;
/// Default result cap for location and issue-type searches.
pub const DEFAULT_LOCATION_SEARCH_LIMIT: usize = 50;
/// Default Hamming threshold for exploratory similarity search.
pub const DEFAULT_SIMILARITY_HASH_THRESHOLD: u32 = 10;
/// Default result cap for ranked similarity search.
pub const DEFAULT_SIMILARITY_LIMIT: usize = 20;
/// Default geohash precision for ticket cells (~150 m).
pub const DEFAULT_CELL_PRECISION: usize = 7;

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Duplicate-check radius in meters (default: 50)
    pub duplicate_distance_m: f64,
    /// Duplicate-check Hamming threshold (default: 5)
    pub duplicate_hash_threshold: u32,
    /// Batch clustering anchor radius in meters (default: 20)
    pub cluster_distance_m: f64,
    /// Location search radius in meters (default: 1000)
    pub location_search_distance_m: f64,
    /// Location / issue-type search result cap (default: 50)
    pub location_search_limit: usize,
    /// Similarity search Hamming threshold (default: 10)
    pub similarity_hash_threshold: u32,
    /// Similarity search result cap (default: 20)
    pub similarity_limit: usize,
    /// Geohash precision used to label ticket cells (default: 7)
    pub cell_precision: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_distance_m: DEFAULT_DUPLICATE_DISTANCE_M,
            duplicate_hash_threshold: DEFAULT_DUPLICATE_HASH_THRESHOLD,
            cluster_distance_m: DEFAULT_CLUSTER_DISTANCE_M,
            location_search_distance_m: DEFAULT_LOCATION_SEARCH_DISTANCE_M,
            location_search_limit: DEFAULT_LOCATION_SEARCH_LIMIT,
            similarity_hash_threshold: DEFAULT_SIMILARITY_HASH_THRESHOLD,
            similarity_limit: DEFAULT_SIMILARITY_LIMIT,
            cell_precision: DEFAULT_CELL_PRECISION,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let duplicate_distance_m = lookup("CIVIC_DUPLICATE_DISTANCE_M")
            .and_then(|v| v.parse().ok())
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .unwrap_or(defaults.duplicate_distance_m);

        let duplicate_hash_threshold = lookup("CIVIC_DUPLICATE_HASH_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.duplicate_hash_threshold);

        let cluster_distance_m = lookup("CIVIC_CLUSTER_DISTANCE_M")
            .and_then(|v| v.parse().ok())
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .unwrap_or(defaults.cluster_distance_m);

        let location_search_distance_m = lookup("CIVIC_LOCATION_SEARCH_DISTANCE_M")
            .and_then(|v| v.parse().ok())
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .unwrap_or(defaults.location_search_distance_m);

        let location_search_limit = lookup("CIVIC_LOCATION_SEARCH_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.location_search_limit);

        let similarity_hash_threshold = lookup("CIVIC_SIMILARITY_HASH_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.similarity_hash_threshold);

        let similarity_limit = lookup("CIVIC_SIMILARITY_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.similarity_limit);

        let cell_precision = lookup("CIVIC_CELL_PRECISION")
            .and_then(|v| v.parse().ok())
            .filter(|v: &usize| (1..=12).contains(v))
            .unwrap_or(defaults.cell_precision);

        Self {
            duplicate_distance_m,
            duplicate_hash_threshold,
            cluster_distance_m,
            location_search_distance_m,
            location_search_limit,
            similarity_hash_threshold,
            similarity_limit,
            cell_precision,
        }
    }
}
