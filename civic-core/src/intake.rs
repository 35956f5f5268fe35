//! Batch intake planning.
//!
//! Turns one multi-file submission into a ticket plan without writing
//! anything: items are clustered by location, each cluster is split by
//! detected issue, and every image is duplicate-checked against stored
//! records and against images already accepted earlier in the same batch.
//! Videos skip the duplicate check.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::{group_by_location, SubmissionItem};
use crate::config::EngineConfig;
use crate::detector::{find_duplicate, DuplicateDetector, DuplicatePolicy, MatchedRecord, DUPLICATE_MESSAGE};
use crate::error::{CivicError, Result};
use crate::fingerprint::{self, Fingerprint};
use crate::geo::{usable, Coordinate};
use crate::record::{MediaKind, MediaRecord, RecordLookup};
use crate::routing::{normalize_issue_label, AuthorityMap};

/// Message for media in which no routable issue was detected.
pub const NO_ISSUE_MESSAGE: &str = "There is no distortion. Thanks for your concern.";

/// Why an item was left out of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// No detection mapped to a known authority.
    NoIssueDetected,
    /// Matches an already stored record.
    Duplicate,
    /// Matches an image accepted earlier in this batch.
    DuplicateInBatch,
    /// Claimed to be an image but could not be decoded.
    UnreadableImage,
}

/// An item that will not be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedMedia {
    pub file_name: String,
    pub media_kind: MediaKind,
    pub kind: RejectionKind,
    pub message: String,
    /// Stored record matched, for [`RejectionKind::Duplicate`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchedRecord>,
    /// Earlier batch item matched, for [`RejectionKind::DuplicateInBatch`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

/// An item that will be stored under a sub-ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedMedia {
    pub file_name: String,
    pub content_type: String,
    pub media_kind: MediaKind,
    /// Usable location only; the (0, 0) sentinel is dropped.
    pub coordinate: Option<Coordinate>,
    pub confidence: f32,
    /// Present for images.
    pub fingerprint: Option<Fingerprint>,
}

/// One issue type under a planned ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSubTicket {
    pub issue_type: String,
    pub authority: String,
    pub media: Vec<AcceptedMedia>,
}

/// One location cluster that yields at least one accepted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTicket {
    /// Anchor location of the cluster.
    pub coordinate: Option<Coordinate>,
    /// Geohash cell of the anchor, when it has a usable location.
    pub cell: Option<String>,
    pub sub_tickets: Vec<PlannedSubTicket>,
    /// Items of this cluster that were rejected.
    pub rejected: Vec<RejectedMedia>,
}

/// Ticket plan for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub tickets: Vec<PlannedTicket>,
    /// Rejections from clusters where nothing was accepted.
    pub rejected: Vec<RejectedMedia>,
}

impl BatchPlan {
    pub fn accepted_count(&self) -> usize {
        self.tickets
            .iter()
            .flat_map(|t| &t.sub_tickets)
            .map(|s| s.media.len())
            .sum()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len() + self.tickets.iter().map(|t| t.rejected.len()).sum::<usize>()
    }

    /// Every rejection, in cluster order.
    pub fn all_rejections(&self) -> impl Iterator<Item = &RejectedMedia> {
        self.tickets.iter().flat_map(|t| &t.rejected).chain(&self.rejected)
    }
}

/// Images accepted so far in the batch, as provisional records.
#[derive(Default)]
struct Pending {
    records: Vec<MediaRecord>,
    names: Vec<String>,
}

impl Pending {
    fn push(&mut self, media: &AcceptedMedia, issue_type: &str) {
        self.records.push(MediaRecord {
            id: self.records.len() as i64,
            fingerprint: media.fingerprint.clone(),
            latitude: media.coordinate.map(|c| c.latitude),
            longitude: media.coordinate.map(|c| c.longitude),
            sub_case_id: issue_type.to_string(),
            created_at: Utc::now(),
            file_name: Some(media.file_name.clone()),
            content_type: Some(media.content_type.clone()),
        });
        self.names.push(media.file_name.clone());
    }

    fn name_of(&self, id: i64) -> Option<&str> {
        usize::try_from(id).ok().and_then(|i| self.names.get(i)).map(String::as_str)
    }
}

/// Plans tickets for multi-file submissions.
pub struct BatchPlanner<'a, L: RecordLookup + ?Sized> {
    lookup: &'a L,
    authorities: &'a AuthorityMap,
    config: EngineConfig,
}

impl<'a, L: RecordLookup + ?Sized> BatchPlanner<'a, L> {
    pub fn new(lookup: &'a L, authorities: &'a AuthorityMap) -> Self {
        Self {
            lookup,
            authorities,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Plan tickets for `items`.
    ///
    /// # Errors
    ///
    /// Only storage errors abort the plan. An image that fails to decode is
    /// rejected on its own and never treated as novel.
    pub fn plan(&self, items: Vec<SubmissionItem>) -> Result<BatchPlan> {
        let total = items.len();
        let policy = DuplicatePolicy::from(&self.config);
        let detector = DuplicateDetector::new(self.lookup).with_policy(policy);
        let mut pending = Pending::default();
        let mut plan = BatchPlan::default();

        for cluster in group_by_location(items, self.config.cluster_distance_m) {
            let anchor = usable(cluster.anchor().coordinate);
            let mut rejected = Vec::new();
            let mut by_issue: Vec<(String, Vec<SubmissionItem>)> = Vec::new();

            for item in cluster.into_members() {
                let label = item
                    .issue
                    .as_ref()
                    .map(|i| normalize_issue_label(&i.label))
                    .filter(|label| self.authorities.recognizes(label));
                match label {
                    Some(label) => {
                        match by_issue.iter_mut().find(|(l, _)| *l == label) {
                            Some((_, group)) => group.push(item),
                            None => by_issue.push((label, vec![item])),
                        }
                    }
                    None => rejected.push(reject(&item, RejectionKind::NoIssueDetected, NO_ISSUE_MESSAGE)),
                }
            }

            let mut sub_tickets = Vec::new();
            for (issue_type, group) in by_issue {
                let Some(authority) = self.authorities.authority_for(&issue_type) else {
                    continue;
                };
                let mut media = Vec::new();
                for item in group {
                    match self.screen(&detector, &policy, &pending, item)? {
                        Ok(accepted) => {
                            if accepted.fingerprint.is_some() {
                                pending.push(&accepted, &issue_type);
                            }
                            media.push(accepted);
                        }
                        Err(rejection) => rejected.push(rejection),
                    }
                }
                if !media.is_empty() {
                    sub_tickets.push(PlannedSubTicket {
                        issue_type,
                        authority: authority.to_string(),
                        media,
                    });
                }
            }

            if sub_tickets.is_empty() {
                plan.rejected.extend(rejected);
                continue;
            }

            let cell = anchor.and_then(|c| c.geohash(self.config.cell_precision).ok());
            plan.tickets.push(PlannedTicket {
                coordinate: anchor,
                cell,
                sub_tickets,
                rejected,
            });
        }

        info!(
            items = total,
            tickets = plan.tickets.len(),
            accepted = plan.accepted_count(),
            rejected = plan.rejected_count(),
            "Planned batch intake"
        );

        Ok(plan)
    }

    /// Duplicate-screen one recognized item. The outer `Result` carries
    /// storage errors only.
    fn screen(
        &self,
        detector: &DuplicateDetector<'a, L>,
        policy: &DuplicatePolicy,
        pending: &Pending,
        item: SubmissionItem,
    ) -> Result<std::result::Result<AcceptedMedia, RejectedMedia>> {
        let coordinate = usable(item.coordinate);
        let confidence = item.issue.as_ref().map_or(0.0, |i| i.confidence);

        if item.media_kind == MediaKind::Video {
            debug!(file = %item.file_name, "Video skips duplicate check");
            return Ok(Ok(accept(item, coordinate, confidence, None)));
        }

        let fingerprint = match fingerprint::compute(&item.bytes) {
            Ok(fp) => fp,
            Err(CivicError::InvalidImage(message)) => {
                warn!(file = %item.file_name, error = %message, "Rejecting unreadable image");
                return Ok(Err(reject(&item, RejectionKind::UnreadableImage, &message)));
            }
            Err(e) => return Err(e),
        };

        let verdict = detector.check_fingerprint(&fingerprint, coordinate)?;
        if verdict.is_duplicate {
            let message = verdict.reason.unwrap_or_else(|| DUPLICATE_MESSAGE.to_string());
            let mut rejection = reject(&item, RejectionKind::Duplicate, &message);
            rejection.matched = verdict.matched;
            return Ok(Err(rejection));
        }

        if let Some(found) = find_duplicate(&fingerprint, coordinate, &pending.records, policy) {
            let mut rejection = reject(&item, RejectionKind::DuplicateInBatch, DUPLICATE_MESSAGE);
            rejection.duplicate_of = pending.name_of(found.record.id).map(str::to_string);
            debug!(
                file = %item.file_name,
                duplicate_of = ?rejection.duplicate_of,
                "Rejected duplicate within batch"
            );
            return Ok(Err(rejection));
        }

        Ok(Ok(accept(item, coordinate, confidence, Some(fingerprint))))
    }
}

fn accept(
    item: SubmissionItem,
    coordinate: Option<Coordinate>,
    confidence: f32,
    fingerprint: Option<Fingerprint>,
) -> AcceptedMedia {
    AcceptedMedia {
        file_name: item.file_name,
        content_type: item.content_type,
        media_kind: item.media_kind,
        coordinate,
        confidence,
        fingerprint,
    }
}

fn reject(item: &SubmissionItem, kind: RejectionKind, message: &str) -> RejectedMedia {
    RejectedMedia {
        file_name: item.file_name.clone(),
        media_kind: item.media_kind,
        kind,
        message: message.to_string(),
        matched: None,
        duplicate_of: None,
    }
}

/// Plan `items` with the given collaborators and configuration.
pub fn plan_batch<L: RecordLookup + ?Sized>(
    items: Vec<SubmissionItem>,
    lookup: &L,
    authorities: &AuthorityMap,
    config: &EngineConfig,
) -> Result<BatchPlan> {
    BatchPlanner::new(lookup, authorities)
        .with_config(config.clone())
        .plan(items)
}
