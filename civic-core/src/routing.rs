//! Issue labels and handling authorities.
//!
//! The mapping itself belongs to the ticketing layer; this module only
//! normalizes labels and looks them up.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Normalize a free-form issue label to its lookup key.
///
/// Trims, lowercases and strips spaces, hyphens and underscores. The common
/// spelling `pothole` maps to the detector's `pathholes` class.
pub fn normalize_issue_label(raw: &str) -> String {
    let key: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect();

    match key.as_str() {
        "pothole" | "potholes" => "pathholes".to_string(),
        _ => key,
    }
}

/// Normalized issue label → authority name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct AuthorityMap {
    entries: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for AuthorityMap {
    fn from(entries: BTreeMap<String, String>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<AuthorityMap> for BTreeMap<String, String> {
    fn from(map: AuthorityMap) -> Self {
        map.entries
    }
}

impl Default for AuthorityMap {
    /// The default municipal routing table.
    fn default() -> Self {
        let roads = "Roads Department";
        let sanitation = "Sanitation Department";
        let municipal = "Municipal Corporation";

        [
            ("pathholes", roads),
            ("roadcracks", roads),
            ("waterpuddles", roads),
            ("openmanhole", roads),
            ("garbage", sanitation),
            ("garbageoverflow", sanitation),
            ("animalcarcass", sanitation),
            ("sandonroad", sanitation),
            ("streetdebris", municipal),
            ("streethawker", municipal),
        ]
        .into_iter()
        .collect()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for AuthorityMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (normalize_issue_label(k.as_ref()), v.into()))
                .collect(),
        }
    }
}

impl AuthorityMap {
    /// Authority handling `label`, after normalization.
    pub fn authority_for(&self, label: &str) -> Option<&str> {
        self.entries
            .get(&normalize_issue_label(label))
            .map(String::as_str)
    }

    /// Whether `label` names a routable issue.
    pub fn recognizes(&self, label: &str) -> bool {
        self.authority_for(label).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// One object-detection result for a piece of media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

/// A recognized issue with the confidence it was detected at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryIssue {
    pub label: String,
    pub confidence: f32,
}

/// The highest-confidence detection whose label the map recognizes.
///
/// Ties keep the earlier detection. Detections with zero confidence never
/// count.
pub fn primary_issue(detections: &[Detection], authorities: &AuthorityMap) -> Option<PrimaryIssue> {
    let mut best: Option<PrimaryIssue> = None;
    for detection in detections {
        let label = normalize_issue_label(&detection.label);
        if !authorities.recognizes(&label) {
            continue;
        }
        let current = best.as_ref().map_or(0.0, |b| b.confidence);
        if detection.confidence > current {
            best = Some(PrimaryIssue {
                label,
                confidence: detection.confidence,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.into(),
            confidence,
        }
    }

    #[test]
    fn test_normalize_issue_label() {
        assert_eq!(normalize_issue_label("  Street_Debris "), "streetdebris");
        assert_eq!(normalize_issue_label("open-manhole"), "openmanhole");
        assert_eq!(normalize_issue_label("Pothole"), "pathholes");
        assert_eq!(normalize_issue_label("Garbage Overflow"), "garbageoverflow");
    }

    #[test]
    fn test_default_authorities() {
        let map = AuthorityMap::default();
        assert_eq!(map.authority_for("pothole"), Some("Roads Department"));
        assert_eq!(map.authority_for("street_debris"), Some("Municipal Corporation"));
        assert_eq!(map.authority_for("animal carcass"), Some("Sanitation Department"));
        assert_eq!(map.authority_for("graffiti"), None);
    }

    #[test]
    fn test_custom_map_normalizes_keys() {
        let map: AuthorityMap = [("Fallen_Tree", "Parks Department")].into_iter().collect();
        assert!(map.recognizes("fallen tree"));
        assert_eq!(map.labels().collect::<Vec<_>>(), vec!["fallentree"]);
    }

    #[test]
    fn test_authority_map_serde_normalizes() {
        let map: AuthorityMap =
            serde_json::from_str(r#"{"Garbage_Overflow": "Sanitation"}"#).unwrap();
        assert_eq!(map.authority_for("garbage overflow"), Some("Sanitation"));
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"garbageoverflow":"Sanitation"}"#
        );
    }

    #[test]
    fn test_primary_issue_picks_highest_recognized() {
        let map = AuthorityMap::default();
        let detections = vec![
            det("person", 0.99),
            det("garbage", 0.61),
            det("Path_Holes", 0.87),
            det("sandonroad", 0.87),
        ];
        let issue = primary_issue(&detections, &map).unwrap();
        assert_eq!(issue.label, "pathholes");
        assert_eq!(issue.confidence, 0.87);
    }

    #[test]
    fn test_primary_issue_none_when_unrecognized() {
        let map = AuthorityMap::default();
        assert!(primary_issue(&[det("car", 0.9)], &map).is_none());
        assert!(primary_issue(&[], &map).is_none());
        assert!(primary_issue(&[det("garbage", 0.0)], &map).is_none());
    }
}
