//! Candidate-to-canonical mapping. Pure: no IO, no clock reads.

use chrono::{DateTime, Utc};
use grantwell_common::fingerprint::fingerprint;
use grantwell_common::types::{
    DeadlineType, ExtractedGrant, GrantStatus, LinkStatus, NormalizedGrant, ValidationResult,
};

/// Map a validated candidate into its canonical persisted form.
///
/// Status resolution: an explicit status from the source always wins. Without
/// one, a fixed deadline already in the past means closed, anything else means
/// open. Rolling deadlines never close on their own.
pub fn normalize(
    candidate: &ExtractedGrant,
    source_name: &str,
    source_id: &str,
    validation: &ValidationResult,
    link_status: LinkStatus,
    now: DateTime<Utc>,
) -> NormalizedGrant {
    let status = resolve_status(candidate, now);

    let states: Vec<String> = candidate
        .geography
        .states
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect();

    NormalizedGrant {
        source_id: source_id.to_string(),
        source_name: source_name.to_string(),
        title: candidate.title.trim().to_string(),
        sponsor: candidate.sponsor.trim().to_string(),
        description: candidate.description.trim().to_string(),
        url: candidate.apply_url.clone(),
        funding_min: candidate.funding.min,
        funding_max: candidate.funding.max,
        funding_text: candidate.funding.text.clone(),
        funding_type: candidate.funding.funding_type,
        deadline_type: candidate.deadline.deadline_type,
        deadline_date: candidate.deadline.date,
        deadline_text: candidate.deadline.text.clone(),
        is_national: candidate.geography.is_national,
        states_json: encode(&states),
        entity_types_json: encode(&candidate.eligibility.entity_types),
        industries_json: encode(&candidate.eligibility.industries),
        restrictions_json: encode(&candidate.eligibility.restrictions),
        requirements_json: encode(&candidate.eligibility.requirements),
        categories_json: encode(&candidate.categories),
        status,
        hash_fingerprint: fingerprint(
            &candidate.title,
            &candidate.sponsor,
            candidate.deadline.date,
            candidate.funding.min,
            candidate.funding.max,
        ),
        quality_score: validation.quality_score,
        link_status,
        last_verified_at: now,
        first_seen_at: now,
        updated_at: now,
    }
}

fn resolve_status(candidate: &ExtractedGrant, now: DateTime<Utc>) -> GrantStatus {
    if let Some(explicit) = candidate.source_status {
        return explicit;
    }
    match (candidate.deadline.deadline_type, candidate.deadline.date) {
        (DeadlineType::Fixed, Some(date)) if date < now.date_naive() => GrantStatus::Closed,
        _ => GrantStatus::Open,
    }
}

fn encode<T: serde::Serialize>(values: &[T]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}
