//! Completeness and plausibility checks, scored additively.
//!
//! Validation is a pure decision over a candidate plus a link probe result.
//! Critical errors (no title, no sponsor, unusable URL) make a candidate
//! invalid outright; everything else only moves the quality score.

use chrono::NaiveDate;
use grantwell_common::quality::{
    MIN_DESCRIPTION_LEN, MIN_QUALITY_SCORE, PENALTY_DEAD_URL, PENALTY_EXPIRED_DEADLINE,
    SCORE_DEADLINE, SCORE_DESCRIPTION, SCORE_ELIGIBILITY, SCORE_FUNDING, SCORE_GEOGRAPHY,
    SCORE_SPONSOR, SCORE_TITLE, SCORE_URL_LIVE,
};
use grantwell_common::types::{
    DeadlineType, ExtractedGrant, LinkStatus, ValidationResult,
};

const PLACEHOLDER_TITLES: &[&str] = &["untitled", "n/a", "na", "tbd", "test", "unknown", "title"];

fn is_placeholder_title(title: &str) -> bool {
    let t = title.trim().to_lowercase();
    t.is_empty() || PLACEHOLDER_TITLES.contains(&t.as_str())
}

fn url_is_usable(url: &str) -> bool {
    matches!(url::Url::parse(url), Ok(u) if u.scheme() == "http" || u.scheme() == "https")
}

/// Validate one candidate. `link_status` comes from the fetcher's HEAD probe;
/// pass `Unknown` when the probe was skipped, which neither scores nor
/// penalizes the URL. Duplicate fields are filled in by the dedup stage.
pub fn validate(
    candidate: &ExtractedGrant,
    link_status: LinkStatus,
    today: NaiveDate,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut score: i32 = 0;

    result.has_title = !is_placeholder_title(&candidate.title);
    if result.has_title {
        score += i32::from(SCORE_TITLE);
    } else {
        result
            .errors
            .push(format!("missing or placeholder title: {:?}", candidate.title));
    }

    result.has_sponsor = !candidate.sponsor.trim().is_empty();
    if result.has_sponsor {
        score += i32::from(SCORE_SPONSOR);
    } else {
        result.errors.push("missing sponsor".to_string());
    }

    result.apply_url_valid = url_is_usable(&candidate.apply_url);
    if !result.apply_url_valid {
        result
            .errors
            .push(format!("apply URL is unusable: {:?}", candidate.apply_url));
    }

    result.has_description = candidate.description.trim().len() >= MIN_DESCRIPTION_LEN;
    if result.has_description {
        score += i32::from(SCORE_DESCRIPTION);
    } else {
        result.warnings.push("description missing or too short".to_string());
    }

    result.apply_url_live = link_status == LinkStatus::Active;
    match link_status {
        LinkStatus::Active => score += i32::from(SCORE_URL_LIVE),
        LinkStatus::Broken => {
            score -= i32::from(PENALTY_DEAD_URL);
            result.warnings.push("apply URL did not respond".to_string());
        }
        LinkStatus::Unknown => {}
    }

    result.has_deadline = candidate.deadline.deadline_type != DeadlineType::Unknown;
    if result.has_deadline {
        score += i32::from(SCORE_DEADLINE);
    }

    result.deadline_not_expired = !matches!(
        (candidate.deadline.deadline_type, candidate.deadline.date),
        (DeadlineType::Fixed, Some(date)) if date < today
    );
    if !result.deadline_not_expired {
        score -= i32::from(PENALTY_EXPIRED_DEADLINE);
        result.warnings.push("deadline has already passed".to_string());
    }

    result.has_funding_info = candidate.funding.min.is_some()
        || candidate.funding.max.is_some()
        || candidate.funding.text.is_some();
    if result.has_funding_info {
        score += i32::from(SCORE_FUNDING);
    }

    let e = &candidate.eligibility;
    result.has_eligibility_info = !e.entity_types.is_empty()
        || !e.industries.is_empty()
        || !e.restrictions.is_empty()
        || !e.requirements.is_empty();
    if result.has_eligibility_info {
        score += i32::from(SCORE_ELIGIBILITY);
    }

    result.has_geography_info =
        candidate.geography.is_national || !candidate.geography.states.is_empty();
    if result.has_geography_info {
        score += i32::from(SCORE_GEOGRAPHY);
    }

    result.quality_score = score.clamp(0, 100) as u8;
    result.is_valid =
        result.errors.is_empty() && result.quality_score >= MIN_QUALITY_SCORE;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwell_common::types::{
        DeadlineInfo, EntityType, FundingInfo, FundingType, GeographyInfo,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn complete() -> ExtractedGrant {
        ExtractedGrant {
            title: "Rural Broadband Expansion".into(),
            sponsor: "Dept of Commerce".into(),
            description: "Funding to expand broadband access in rural and underserved communities."
                .into(),
            apply_url: "https://grants.gov/opp/123".into(),
            funding: FundingInfo {
                min: Some(10_000.0),
                max: Some(250_000.0),
                text: None,
                funding_type: FundingType::Grant,
            },
            deadline: DeadlineInfo {
                deadline_type: DeadlineType::Fixed,
                date: NaiveDate::from_ymd_opt(2026, 10, 1),
                text: None,
            },
            geography: GeographyInfo {
                is_national: true,
                states: Vec::new(),
            },
            eligibility: grantwell_common::types::EligibilityInfo {
                entity_types: vec![EntityType::Nonprofit],
                industries: Vec::new(),
                restrictions: Vec::new(),
                requirements: Vec::new(),
            },
            categories: Vec::new(),
            source_status: None,
            extraction_confidence: 95,
        }
    }

    #[test]
    fn complete_candidate_scores_full_marks() {
        let r = validate(&complete(), LinkStatus::Active, today());
        assert_eq!(r.quality_score, 100);
        assert!(r.is_valid);
        assert!(r.errors.is_empty());
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn missing_title_is_a_critical_error() {
        let mut c = complete();
        c.title = "TBD".into();
        let r = validate(&c, LinkStatus::Active, today());
        assert!(!r.has_title);
        assert!(!r.is_valid);
        // Score alone would still clear the floor; the error is what invalidates.
        assert!(r.quality_score >= MIN_QUALITY_SCORE);
    }

    #[test]
    fn sparse_candidate_fails_the_score_floor() {
        let c = ExtractedGrant {
            title: "Some Grant".into(),
            sponsor: "Someone".into(),
            description: "Short.".into(),
            apply_url: "https://example.org/g".into(),
            funding: Default::default(),
            deadline: Default::default(),
            geography: Default::default(),
            eligibility: Default::default(),
            categories: Vec::new(),
            source_status: None,
            extraction_confidence: 60,
        };
        let r = validate(&c, LinkStatus::Unknown, today());
        assert!(r.errors.is_empty());
        assert_eq!(r.quality_score, 25);
        assert!(!r.is_valid);
    }

    #[test]
    fn expired_deadline_is_penalized_not_fatal() {
        let mut c = complete();
        c.deadline.date = NaiveDate::from_ymd_opt(2026, 1, 15);
        let r = validate(&c, LinkStatus::Active, today());
        assert!(!r.deadline_not_expired);
        assert_eq!(r.quality_score, 80);
        assert!(r.is_valid);
        assert!(r.warnings.iter().any(|w| w.contains("passed")));
    }

    #[test]
    fn rolling_deadline_never_expires() {
        let mut c = complete();
        c.deadline = DeadlineInfo {
            deadline_type: DeadlineType::Rolling,
            date: None,
            text: Some("rolling".into()),
        };
        let r = validate(&c, LinkStatus::Active, today());
        assert!(r.deadline_not_expired);
        assert!(r.has_deadline);
    }

    #[test]
    fn broken_link_penalizes_and_warns() {
        let r = validate(&complete(), LinkStatus::Broken, today());
        assert!(!r.apply_url_live);
        // Loses the liveness points and takes the penalty.
        assert_eq!(r.quality_score, 80);
        assert!(r.warnings.iter().any(|w| w.contains("URL")));
    }

    #[test]
    fn unknown_link_status_neither_scores_nor_penalizes() {
        let r = validate(&complete(), LinkStatus::Unknown, today());
        assert_eq!(r.quality_score, 90);
        assert!(r.is_valid);
    }

    #[test]
    fn bad_url_is_a_critical_error() {
        let mut c = complete();
        c.apply_url = "not a url".into();
        let r = validate(&c, LinkStatus::Unknown, today());
        assert!(!r.apply_url_valid);
        assert!(!r.is_valid);
    }
}
