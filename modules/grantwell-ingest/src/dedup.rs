//! Three-tier duplicate detection against the persisted corpus.
//!
//! Tier 1 is identity: same `(source_name, source_id)` means the same record
//! re-observed, which is an update, not a duplicate. Tier 2 is the content
//! fingerprint, catching the same grant republished under a new source ID.
//! Tier 3 is weighted fuzzy similarity for cross-source copies, gated by a
//! second pass over the stored shape so one lucky title match cannot merge
//! two distinct programs.

use std::collections::HashSet;

use grantwell_common::fingerprint::normalize_key;
use grantwell_common::types::ExtractedGrant;
use grantwell_common::IngestError;
use tracing::debug;

use crate::store::{GrantStore, GrantSummary};

/// Tier-2 (fingerprint) matches report this fixed similarity.
pub const FINGERPRINT_SIMILARITY: f64 = 0.95;

/// Candidate-vs-summary weights: title, sponsor, description, deadline.
const CANDIDATE_WEIGHTS: [f64; 4] = [0.4, 0.25, 0.25, 0.1];
/// Confirmation weights over stored shapes: title, sponsor, funding overlap,
/// deadline, URL host.
const CONFIRM_WEIGHTS: [f64; 5] = [0.4, 0.2, 0.2, 0.1, 0.1];

/// What to do with a candidate, decided before persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupDecision {
    /// Unseen grant; insert.
    New,
    /// Same source identity already stored; upsert in place.
    Update,
    /// Same grant under a different identity; record but do not insert.
    Duplicate {
        /// Fingerprint of the record this candidate duplicates.
        of_fingerprint: String,
        similarity: f64,
    },
}

/// Duplicate detector loaded once per run and updated as the batch inserts,
/// so within-batch duplicates are caught without re-querying the store.
pub struct Deduplicator {
    threshold: f64,
    existing_keys: HashSet<(String, String)>,
    fingerprints: HashSet<String>,
    summaries: Vec<GrantSummary>,
}

impl Deduplicator {
    pub async fn load(store: &dyn GrantStore, threshold: f64) -> Result<Self, IngestError> {
        Ok(Self {
            threshold,
            existing_keys: store.existing_keys().await?.into_iter().collect(),
            fingerprints: store.existing_fingerprints().await?.into_iter().collect(),
            summaries: store.summaries().await?,
        })
    }

    #[cfg(test)]
    pub fn empty(threshold: f64) -> Self {
        Self {
            threshold,
            existing_keys: HashSet::new(),
            fingerprints: HashSet::new(),
            summaries: Vec::new(),
        }
    }

    pub fn decide(
        &self,
        source_name: &str,
        source_id: &str,
        candidate: &ExtractedGrant,
        fingerprint: &str,
    ) -> DedupDecision {
        let key = (source_name.to_string(), source_id.to_string());
        if self.existing_keys.contains(&key) {
            return DedupDecision::Update;
        }

        if self.fingerprints.contains(fingerprint) {
            return DedupDecision::Duplicate {
                of_fingerprint: fingerprint.to_string(),
                similarity: FINGERPRINT_SIMILARITY,
            };
        }

        let mut best: Option<(&GrantSummary, f64)> = None;
        for summary in &self.summaries {
            let score = candidate_similarity(candidate, summary);
            if score >= self.threshold && best.is_none_or(|(_, b)| score > b) {
                best = Some((summary, score));
            }
        }

        if let Some((summary, first_pass)) = best {
            let confirmed = confirm_similarity(candidate, summary);
            debug!(
                title = %candidate.title,
                against = %summary.title,
                first_pass,
                confirmed,
                "Fuzzy duplicate candidate"
            );
            if confirmed >= self.threshold {
                return DedupDecision::Duplicate {
                    of_fingerprint: summary.fingerprint.clone(),
                    similarity: confirmed,
                };
            }
        }

        DedupDecision::New
    }

    /// Record a just-persisted grant so later candidates in the same batch
    /// dedup against it.
    pub fn note_persisted(&mut self, summary: GrantSummary) {
        self.existing_keys
            .insert((summary.source_name.clone(), summary.source_id.clone()));
        self.fingerprints.insert(summary.fingerprint.clone());
        self.summaries.push(summary);
    }
}

/// First-pass similarity: candidate text against a stored summary.
fn candidate_similarity(candidate: &ExtractedGrant, summary: &GrantSummary) -> f64 {
    let [w_title, w_sponsor, w_desc, w_deadline] = CANDIDATE_WEIGHTS;
    w_title * jaccard(&candidate.title, &summary.title)
        + w_sponsor * jaccard(&candidate.sponsor, &summary.sponsor)
        + w_desc * jaccard(&candidate.description, &summary.description)
        + w_deadline * date_similarity(candidate.deadline.date, summary.deadline_date)
}

/// Confirmation pass: adds funding-range overlap and URL host agreement.
fn confirm_similarity(candidate: &ExtractedGrant, summary: &GrantSummary) -> f64 {
    let [w_title, w_sponsor, w_funding, w_deadline, w_host] = CONFIRM_WEIGHTS;
    w_title * jaccard(&candidate.title, &summary.title)
        + w_sponsor * jaccard(&candidate.sponsor, &summary.sponsor)
        + w_funding
            * funding_overlap(
                candidate.funding.min,
                candidate.funding.max,
                summary.funding_min,
                summary.funding_max,
            )
        + w_deadline * date_similarity(candidate.deadline.date, summary.deadline_date)
        + w_host * host_similarity(&candidate.apply_url, &summary.url)
}

/// Jaccard similarity over normalized word sets.
fn jaccard(a: &str, b: &str) -> f64 {
    let norm_a = normalize_key(a);
    let norm_b = normalize_key(b);
    let set_a: HashSet<&str> = norm_a.split_whitespace().collect();
    let set_b: HashSet<&str> = norm_b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    intersection as f64 / union as f64
}

/// Equal dates are a strong signal; two unknowns are neutral; disagreement
/// counts against.
fn date_similarity(a: Option<chrono::NaiveDate>, b: Option<chrono::NaiveDate>) -> f64 {
    match (a, b) {
        (Some(x), Some(y)) if x == y => 1.0,
        (None, None) => 0.5,
        _ => 0.0,
    }
}

/// Overlap of [min, max] ranges as a fraction of their union. Missing bounds
/// on either side are neutral.
fn funding_overlap(
    a_min: Option<f64>,
    a_max: Option<f64>,
    b_min: Option<f64>,
    b_max: Option<f64>,
) -> f64 {
    let (Some(a_lo), Some(a_hi), Some(b_lo), Some(b_hi)) = (
        a_min.or(a_max),
        a_max.or(a_min),
        b_min.or(b_max),
        b_max.or(b_min),
    ) else {
        return 0.5;
    };
    let overlap = (a_hi.min(b_hi) - a_lo.max(b_lo)).max(0.0);
    let union = (a_hi.max(b_hi) - a_lo.min(b_lo)).max(f64::EPSILON);
    if a_lo == b_lo && a_hi == b_hi {
        return 1.0;
    }
    overlap / union
}

fn host_similarity(a: &str, b: &str) -> f64 {
    let host = |u: &str| url::Url::parse(u).ok().and_then(|u| u.host_str().map(str::to_string));
    match (host(a), host(b)) {
        (Some(x), Some(y)) if x == y => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use grantwell_common::types::{DeadlineInfo, DeadlineType, FundingInfo};

    fn candidate(title: &str, sponsor: &str, url: &str) -> ExtractedGrant {
        ExtractedGrant {
            title: title.into(),
            sponsor: sponsor.into(),
            description: "Supports watershed restoration projects across the state.".into(),
            apply_url: url.into(),
            funding: FundingInfo {
                min: Some(25_000.0),
                max: Some(100_000.0),
                text: None,
                funding_type: Default::default(),
            },
            deadline: DeadlineInfo {
                deadline_type: DeadlineType::Fixed,
                date: NaiveDate::from_ymd_opt(2026, 10, 1),
                text: None,
            },
            geography: Default::default(),
            eligibility: Default::default(),
            categories: Vec::new(),
            source_status: None,
            extraction_confidence: 95,
        }
    }

    fn summary(source_id: &str, title: &str, fingerprint: &str) -> GrantSummary {
        GrantSummary {
            source_name: "ca_grants_portal".into(),
            source_id: source_id.into(),
            title: title.into(),
            sponsor: "Water Board".into(),
            description: "Supports watershed restoration projects across the state.".into(),
            deadline_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            funding_min: Some(25_000.0),
            funding_max: Some(100_000.0),
            url: "https://www.grants.ca.gov/grants/water-42".into(),
            fingerprint: fingerprint.into(),
        }
    }

    #[test]
    fn same_source_identity_is_an_update() {
        let mut d = Deduplicator::empty(0.85);
        d.note_persisted(summary("water-42", "Clean Water Innovation Fund", "fp-1"));
        let c = candidate(
            "Clean Water Innovation Fund",
            "Water Board",
            "https://www.grants.ca.gov/grants/water-42",
        );
        assert_eq!(
            d.decide("ca_grants_portal", "water-42", &c, "fp-other"),
            DedupDecision::Update
        );
    }

    #[test]
    fn matching_fingerprint_is_a_duplicate_at_fixed_similarity() {
        let mut d = Deduplicator::empty(0.85);
        d.note_persisted(summary("water-42", "Clean Water Innovation Fund", "fp-1"));
        let c = candidate(
            "Clean Water Innovation Fund",
            "Water Board",
            "https://other.example.org/grants/99",
        );
        match d.decide("other_source", "99", &c, "fp-1") {
            DedupDecision::Duplicate {
                of_fingerprint,
                similarity,
            } => {
                assert_eq!(of_fingerprint, "fp-1");
                assert_eq!(similarity, FINGERPRINT_SIMILARITY);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn near_identical_cross_source_copy_is_caught_fuzzily() {
        let mut d = Deduplicator::empty(0.85);
        d.note_persisted(summary("water-42", "Clean Water Innovation Fund", "fp-1"));
        // Same program syndicated elsewhere with the same apply URL host.
        let c = candidate(
            "Clean Water Innovation Fund",
            "Water Board",
            "https://www.grants.ca.gov/grants/water-42?utm=feed",
        );
        match d.decide("rural_health_feed", "entry-7", &c, "fp-2") {
            DedupDecision::Duplicate { of_fingerprint, similarity } => {
                assert_eq!(of_fingerprint, "fp-1");
                assert!(similarity >= 0.85);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_grant_is_new() {
        let mut d = Deduplicator::empty(0.85);
        d.note_persisted(summary("water-42", "Clean Water Innovation Fund", "fp-1"));
        let mut c = candidate(
            "Small Business Export Vouchers",
            "Commerce Agency",
            "https://exports.example.gov/apply",
        );
        c.description = "Vouchers to help small firms enter overseas markets.".into();
        c.funding = FundingInfo {
            min: Some(5_000.0),
            max: Some(10_000.0),
            text: None,
            funding_type: Default::default(),
        };
        c.deadline.date = NaiveDate::from_ymd_opt(2026, 3, 1);
        assert_eq!(
            d.decide("other_source", "exp-1", &c, "fp-3"),
            DedupDecision::New
        );
    }

    #[test]
    fn similar_text_but_disjoint_shape_fails_confirmation() {
        let mut d = Deduplicator::empty(0.85);
        d.note_persisted(summary("water-42", "Clean Water Innovation Fund", "fp-1"));
        // Same wording, but different host, deadline, and funding scale.
        let mut c = candidate(
            "Clean Water Innovation Fund",
            "Water Board",
            "https://elsewhere.example.org/water",
        );
        c.deadline.date = NaiveDate::from_ymd_opt(2027, 2, 1);
        c.funding = FundingInfo {
            min: Some(1_000_000.0),
            max: Some(5_000_000.0),
            text: None,
            funding_type: Default::default(),
        };
        assert_eq!(
            d.decide("other_source", "w-9", &c, "fp-4"),
            DedupDecision::New
        );
    }

    #[test]
    fn within_batch_duplicates_are_caught_after_note_persisted() {
        let mut d = Deduplicator::empty(0.85);
        let c = candidate(
            "Clean Water Innovation Fund",
            "Water Board",
            "https://www.grants.ca.gov/grants/water-42",
        );
        assert_eq!(
            d.decide("ca_grants_portal", "water-42", &c, "fp-1"),
            DedupDecision::New
        );
        d.note_persisted(summary("water-42", "Clean Water Innovation Fund", "fp-1"));
        assert!(matches!(
            d.decide("other_source", "copy-1", &c, "fp-1"),
            DedupDecision::Duplicate { .. }
        ));
    }

    #[test]
    fn jaccard_ranges_and_funding_overlap_behave() {
        assert_eq!(jaccard("Clean Water Fund", "clean water fund"), 1.0);
        assert_eq!(jaccard("alpha beta", "gamma delta"), 0.0);
        assert_eq!(funding_overlap(None, None, Some(1.0), Some(2.0)), 0.5);
        assert_eq!(
            funding_overlap(Some(0.0), Some(10.0), Some(0.0), Some(10.0)),
            1.0
        );
        assert_eq!(
            funding_overlap(Some(0.0), Some(10.0), Some(20.0), Some(30.0)),
            0.0
        );
    }
}
