//! Shared test fixtures.

use chrono::{NaiveDate, TimeZone, Utc};
use grantwell_common::types::{
    DeadlineType, FundingType, GrantStatus, LinkStatus, NormalizedGrant,
};

/// A stored grant with plausible defaults. Tests override what they assert on.
pub fn sample_grant(source_name: &str, source_id: &str) -> NormalizedGrant {
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    NormalizedGrant {
        source_id: source_id.into(),
        source_name: source_name.into(),
        title: format!("Grant {source_id}"),
        sponsor: "Test Agency".into(),
        description: "A plausible description long enough to pass validation checks.".into(),
        url: format!("https://example.gov/grants/{source_id}"),
        funding_min: Some(10_000.0),
        funding_max: Some(50_000.0),
        funding_text: None,
        funding_type: FundingType::Grant,
        deadline_type: DeadlineType::Fixed,
        deadline_date: NaiveDate::from_ymd_opt(2026, 12, 1),
        deadline_text: None,
        is_national: true,
        states_json: "[]".into(),
        entity_types_json: "[]".into(),
        industries_json: "[]".into(),
        restrictions_json: "[]".into(),
        requirements_json: "[]".into(),
        categories_json: "[]".into(),
        status: GrantStatus::Open,
        hash_fingerprint: format!("fp-{source_name}-{source_id}"),
        quality_score: 70,
        link_status: LinkStatus::Unknown,
        last_verified_at: now,
        first_seen_at: now,
        updated_at: now,
    }
}
