//! Greedy spatial clustering of a batch of submissions.
//!
//! One pass in input order. Each item is compared against the anchor (first
//! member) of every open cluster and joins the first cluster whose anchor is
//! within the threshold; otherwise it anchors a new cluster.
//!
//! # Known approximation
//!
//! Only anchors are compared, never later members. Two members of the same
//! cluster can therefore be up to twice the threshold apart, and a member
//! close to a non-anchor item of another cluster is not pulled into it. This
//! mirrors the production grouping and is kept for output stability.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_CLUSTER_DISTANCE_M;
use crate::geo::{distance_meters, usable, Coordinate};
use crate::record::MediaKind;
use crate::routing::PrimaryIssue;

/// Anything that may carry a location.
pub trait Located {
    fn coordinate(&self) -> Option<Coordinate>;
}

impl Located for Coordinate {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(*self)
    }
}

impl Located for Option<Coordinate> {
    fn coordinate(&self) -> Option<Coordinate> {
        *self
    }
}

/// One uploaded file awaiting ticket creation. Lives for one batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionItem {
    pub file_name: String,
    pub content_type: String,
    pub media_kind: MediaKind,
    /// Raw media bytes; not serialized.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub coordinate: Option<Coordinate>,
    /// Recognized issue, absent when detection found nothing routable.
    pub issue: Option<PrimaryIssue>,
}

impl SubmissionItem {
    /// A new item; media kind follows the content type.
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_type = content_type.into();
        Self {
            file_name: file_name.into(),
            media_kind: MediaKind::from_content_type(&content_type),
            content_type,
            bytes,
            coordinate: None,
            issue: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Option<Coordinate>) -> Self {
        self.coordinate = coordinate;
        self
    }

    pub fn with_issue(mut self, issue: Option<PrimaryIssue>) -> Self {
        self.issue = issue;
        self
    }
}

impl Located for SubmissionItem {
    fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }
}

/// An ordered group of items sharing an anchor location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCluster<T> {
    members: Vec<T>,
}

impl<T> LocationCluster<T> {
    fn anchored_by(item: T) -> Self {
        Self {
            members: vec![item],
        }
    }

    /// The first member, against which later items were measured.
    pub fn anchor(&self) -> &T {
        &self.members[0]
    }

    pub fn members(&self) -> &[T] {
        &self.members
    }

    pub fn into_members(self) -> Vec<T> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Group `items` into disjoint clusters with the default 20 m radius.
pub fn group_by_location_default<T: Located>(items: Vec<T>) -> Vec<LocationCluster<T>> {
    group_by_location(items, DEFAULT_CLUSTER_DISTANCE_M)
}

/// Group `items` into disjoint clusters by anchor distance.
///
/// Clusters come out in order of first appearance and members keep input
/// order. Items without a usable coordinate never match an anchor and are
/// never matched against, so each one becomes a singleton cluster.
pub fn group_by_location<T: Located>(items: Vec<T>, distance_threshold: f64) -> Vec<LocationCluster<T>> {
    let total = items.len();
    let mut clusters: Vec<LocationCluster<T>> = Vec::new();
    // Usable anchor coordinate of each cluster, index-aligned with `clusters`.
    let mut anchors: Vec<Option<Coordinate>> = Vec::new();

    for item in items {
        let here = usable(item.coordinate());

        let target = here.and_then(|here| {
            anchors.iter().position(|anchor| {
                anchor.is_some_and(|a| distance_meters(a, here) <= distance_threshold)
            })
        });

        match target {
            Some(index) => clusters[index].members.push(item),
            None => {
                anchors.push(here);
                clusters.push(LocationCluster::anchored_by(item));
            }
        }
    }

    debug!(
        items = total,
        clusters = clusters.len(),
        distance_threshold,
        "Grouped batch by location"
    );

    clusters
}
