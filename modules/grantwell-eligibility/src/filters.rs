//! The seven deterministic filters, each a pure function of (profile, grant).

use grantwell_common::fingerprint::normalize_key;
use grantwell_common::quality::{ELIGIBILITY_MIN_QUALITY, ELIGIBILITY_SOLID_QUALITY};
use grantwell_common::types::{GrantStatus, NormalizedGrant};

use crate::keywords::lexicon_for;
use crate::profile::UserProfile;
use crate::types::{Confidence, EligibilityResult, EngineConfig, FilterName};

/// GRANT_STATUS: open grants pass; closed grants fail; forecasted grants are
/// the uncertain case and pass at low confidence only when configured to.
pub fn grant_status(grant: &NormalizedGrant, config: &EngineConfig) -> EligibilityResult {
    match grant.status {
        GrantStatus::Open => EligibilityResult::pass(FilterName::GrantStatus, Confidence::High),
        GrantStatus::Forecasted if config.allow_unknown_status => {
            EligibilityResult::pass_with_reason(
                FilterName::GrantStatus,
                Confidence::Low,
                "Grant is forecasted, not yet accepting applications",
            )
        }
        GrantStatus::Forecasted => EligibilityResult::fail(
            FilterName::GrantStatus,
            Confidence::High,
            "Grant is forecasted and not yet open",
        ),
        GrantStatus::Closed => EligibilityResult::fail(
            FilterName::GrantStatus,
            Confidence::High,
            "Grant is closed",
        ),
    }
}

/// URL_EXISTS: the apply URL must be present and syntactically valid.
/// Whether absence is fatal is configurable.
pub fn url_exists(grant: &NormalizedGrant, config: &EngineConfig) -> EligibilityResult {
    if grant.url.trim().is_empty() {
        return if config.require_apply_url {
            EligibilityResult::fail(
                FilterName::UrlExists,
                Confidence::High,
                "Grant has no application URL",
            )
        } else {
            EligibilityResult::pass_with_reason(
                FilterName::UrlExists,
                Confidence::Low,
                "Grant has no application URL",
            )
        };
    }
    match url::Url::parse(&grant.url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {
            EligibilityResult::pass(FilterName::UrlExists, Confidence::High)
        }
        _ => EligibilityResult::fail(
            FilterName::UrlExists,
            Confidence::High,
            format!("Application URL is not valid: {}", grant.url),
        ),
    }
}

/// DATA_QUALITY: low-quality records are not actionable recommendations.
pub fn data_quality(grant: &NormalizedGrant) -> EligibilityResult {
    if grant.quality_score < ELIGIBILITY_MIN_QUALITY {
        EligibilityResult::fail(
            FilterName::DataQuality,
            Confidence::High,
            format!(
                "Record quality score {} is below the usable threshold",
                grant.quality_score
            ),
        )
    } else if grant.quality_score < ELIGIBILITY_SOLID_QUALITY {
        EligibilityResult::pass_with_reason(
            FilterName::DataQuality,
            Confidence::Medium,
            format!(
                "Record is incomplete (quality score {})",
                grant.quality_score
            ),
        )
    } else {
        EligibilityResult::pass(FilterName::DataQuality, Confidence::High)
    }
}

/// ENTITY_TYPE: a grant with no declared entity tags is open to all. Otherwise
/// the profile's entity type maps to its compatible tag set and must match a
/// declared tag exactly or by substring in either direction (normalized).
pub fn entity_type(profile: &UserProfile, grant: &NormalizedGrant) -> EligibilityResult {
    let declared = grant.entity_types();
    if declared.is_empty() {
        return EligibilityResult::pass_with_reason(
            FilterName::EntityType,
            Confidence::Medium,
            "Grant declares no entity restrictions; assumed open to all",
        );
    }

    let Some(profile_type) = profile.entity_type else {
        return EligibilityResult::pass_with_reason(
            FilterName::EntityType,
            Confidence::Low,
            "Profile has no entity type; entity restrictions not checked",
        );
    };

    let compat: Vec<String> = profile_type
        .compatible_tags()
        .iter()
        .map(|t| normalize_key(t))
        .collect();

    for tag in &declared {
        let tag_norm = normalize_key(&tag.to_string());
        if *tag == profile_type
            || compat
                .iter()
                .any(|c| c == &tag_norm || c.contains(&tag_norm) || tag_norm.contains(c.as_str()))
        {
            return EligibilityResult::pass(FilterName::EntityType, Confidence::High)
                .with_details(vec![format!("matched entity tag: {tag}")]);
        }
    }

    let declared_list = declared
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    EligibilityResult::fail(
        FilterName::EntityType,
        Confidence::High,
        format!("Grant is limited to: {declared_list}"),
    )
    .with_details(declared.iter().map(|t| t.to_string()).collect())
}

/// GEOGRAPHY: no location data is assumed national; an explicit national
/// marker passes at high confidence; state-restricted grants require the
/// profile's state to appear in the grant's state list.
pub fn geography(profile: &UserProfile, grant: &NormalizedGrant) -> EligibilityResult {
    let states = grant.states();
    if grant.is_national {
        return EligibilityResult::pass(FilterName::Geography, Confidence::High);
    }
    if states.is_empty() {
        return EligibilityResult::pass_with_reason(
            FilterName::Geography,
            Confidence::Medium,
            "Grant has no location data; assumed national",
        );
    }

    let Some(profile_state) = profile.normalized_state() else {
        return EligibilityResult::pass_with_reason(
            FilterName::Geography,
            Confidence::Low,
            "Profile has no state; geographic restrictions not checked",
        );
    };

    if states.iter().any(|s| s.trim().to_uppercase() == profile_state) {
        return EligibilityResult::pass(FilterName::Geography, Confidence::High)
            .with_details(vec![format!("matched state: {profile_state}")]);
    }

    let shown: Vec<String> = states.iter().take(3).cloned().collect();
    let suffix = if states.len() > 3 { ", …" } else { "" };
    EligibilityResult::fail(
        FilterName::Geography,
        Confidence::High,
        format!(
            "Grant is restricted to {}{} and profile is in {}",
            shown.join(", "),
            suffix,
            profile_state
        ),
    )
    .with_details(shown)
}

/// EXPLICIT_EXCLUSIONS: scans grant free text for entity-type- and
/// state-specific exclusion phrasing. Any hit fails regardless of other
/// filters.
pub fn explicit_exclusions(profile: &UserProfile, grant: &NormalizedGrant) -> EligibilityResult {
    let mut haystack = normalize_key(&grant.description);
    for r in grant.restrictions() {
        haystack.push(' ');
        haystack.push_str(&normalize_key(&r));
    }

    if let Some(profile_type) = profile.entity_type {
        for tag in profile_type.compatible_tags() {
            let tag = normalize_key(tag);
            for phrase in [
                format!("{tag}s are not eligible"),
                format!("{tag} is not eligible"),
                format!("{tag}s are ineligible"),
                format!("not open to {tag}"),
                format!("excluding {tag}"),
                format!("except {tag}"),
            ] {
                if haystack.contains(&phrase) {
                    return EligibilityResult::fail(
                        FilterName::ExplicitExclusions,
                        Confidence::High,
                        format!("Grant text explicitly excludes {tag} applicants"),
                    )
                    .with_details(vec![phrase]);
                }
            }
        }
    }

    if let Some(state) = profile.normalized_state() {
        let state = state.to_lowercase();
        for phrase in [
            format!("not available in {state}"),
            format!("excluding {state}"),
            format!("except {state}"),
        ] {
            if haystack.contains(&phrase) {
                return EligibilityResult::fail(
                    FilterName::ExplicitExclusions,
                    Confidence::High,
                    format!(
                        "Grant text explicitly excludes applicants in {}",
                        state.to_uppercase()
                    ),
                )
                .with_details(vec![phrase]);
            }
        }
    }

    EligibilityResult::pass(FilterName::ExplicitExclusions, Confidence::High)
}

/// Per-tag outcome for INDUSTRY_RELEVANCE.
enum TagSignal {
    Match(Confidence, String),
    Excluded(String),
    NoSignal,
}

/// INDUSTRY_RELEVANCE: for each profile industry tag: category-code mapping,
/// then category-name overlap, then keyword density (two or more hits is a
/// strong signal, one is weak). An exclusion-keyword hit for a tag with no
/// accompanying positive hit fails that tag, but the remaining tags are still
/// evaluated, so a legitimately matching second tag can still pass the filter.
pub fn industry_relevance(profile: &UserProfile, grant: &NormalizedGrant) -> EligibilityResult {
    let tags: Vec<String> = profile
        .industry_tags
        .iter()
        .map(|t| normalize_key(t))
        .filter(|t| !t.is_empty())
        .collect();

    if tags.is_empty() {
        return EligibilityResult::pass_with_reason(
            FilterName::IndustryRelevance,
            Confidence::Medium,
            "Profile has no industry tags; relevance not assessed",
        );
    }

    let categories: Vec<String> = grant.categories().iter().map(|c| normalize_key(c)).collect();
    let industries: Vec<String> = grant.industries().iter().map(|i| normalize_key(i)).collect();
    let text = format!(
        "{} {} {}",
        normalize_key(&grant.title),
        normalize_key(&grant.description),
        categories.join(" ")
    );

    // Industry-agnostic grant: nothing to match against, open to any sector.
    if categories.is_empty() && industries.is_empty() && grant.description.trim().is_empty() {
        return EligibilityResult::pass_with_reason(
            FilterName::IndustryRelevance,
            Confidence::Medium,
            "Grant declares no industry focus",
        );
    }

    let mut best: Option<(Confidence, String)> = None;
    let mut excluded: Vec<String> = Vec::new();

    for tag in &tags {
        match tag_signal(tag, &categories, &industries, &text) {
            TagSignal::Match(conf, detail) => {
                let better = match &best {
                    Some((existing, _)) => conf.rank() > existing.rank(),
                    None => true,
                };
                if better {
                    best = Some((conf, detail));
                }
            }
            TagSignal::Excluded(detail) => excluded.push(detail),
            TagSignal::NoSignal => {}
        }
    }

    match best {
        Some((Confidence::High, detail)) => {
            EligibilityResult::pass(FilterName::IndustryRelevance, Confidence::High)
                .with_details(vec![detail])
        }
        Some((conf, detail)) => EligibilityResult::pass_with_reason(
            FilterName::IndustryRelevance,
            conf,
            "Weak industry match",
        )
        .with_details(vec![detail]),
        None if !excluded.is_empty() => EligibilityResult::fail(
            FilterName::IndustryRelevance,
            Confidence::High,
            format!("Grant excludes the profile's industries: {}", excluded.join("; ")),
        )
        .with_details(excluded),
        None => EligibilityResult::fail(
            FilterName::IndustryRelevance,
            Confidence::Medium,
            format!(
                "No industry overlap between profile ({}) and grant",
                tags.join(", ")
            ),
        ),
    }
}

fn tag_signal(
    tag: &str,
    categories: &[String],
    industries: &[String],
    text: &str,
) -> TagSignal {
    let lexicon = lexicon_for(tag);

    // Tier 1: category-code mapping.
    if let Some(lex) = lexicon {
        for code in lex.category_codes {
            let code = code.to_lowercase();
            if categories.iter().any(|c| c == &code) {
                return TagSignal::Match(
                    Confidence::High,
                    format!("{tag}: category code {code}"),
                );
            }
        }
        // Tier 2: category-name overlap.
        for name in lex.category_names {
            let name = normalize_key(name);
            if categories
                .iter()
                .chain(industries.iter())
                .any(|c| c == &name || c.contains(name.as_str()) || name.contains(c.as_str()))
            {
                return TagSignal::Match(
                    Confidence::High,
                    format!("{tag}: category name {name}"),
                );
            }
        }
    } else {
        // Unknown tag: direct overlap against declared categories/industries.
        if categories
            .iter()
            .chain(industries.iter())
            .any(|c| c == tag || c.contains(tag) || tag.contains(c.as_str()))
        {
            return TagSignal::Match(Confidence::High, format!("{tag}: direct category match"));
        }
    }

    // Tier 3: keyword density.
    let keywords: Vec<&str> = lexicon.map(|l| l.keywords.to_vec()).unwrap_or_default();
    let hits = keywords.iter().filter(|k| contains_word(text, k)).count()
        + usize::from(keywords.is_empty() && contains_word(text, tag));

    let exclusion_hits = lexicon
        .map(|l| {
            l.exclusions
                .iter()
                .filter(|e| text.contains(&normalize_key(e)))
                .count()
        })
        .unwrap_or(0);

    if exclusion_hits > 0 && hits == 0 {
        return TagSignal::Excluded(format!("{tag}: exclusion phrasing without positive match"));
    }
    match hits {
        0 => TagSignal::NoSignal,
        1 => TagSignal::Match(Confidence::Medium, format!("{tag}: 1 keyword hit")),
        n => TagSignal::Match(Confidence::High, format!("{tag}: {n} keyword hits")),
    }
}

/// Whole-word containment on normalized text.
fn contains_word(text: &str, word: &str) -> bool {
    let word = normalize_key(word);
    if word.is_empty() {
        return false;
    }
    text.split_whitespace().any(|w| w == word)
        || (word.contains(' ') && text.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use grantwell_common::types::{DeadlineType, EntityType, FundingType, LinkStatus};

    fn grant() -> NormalizedGrant {
        NormalizedGrant {
            source_id: "G-1".into(),
            source_name: "test_source".into(),
            title: "Community Agriculture Grant".into(),
            sponsor: "State Ag Department".into(),
            description: "Support for farm and crop projects serving rural communities."
                .into(),
            url: "https://x.gov/g".into(),
            funding_min: Some(5_000.0),
            funding_max: Some(50_000.0),
            funding_text: None,
            funding_type: FundingType::Grant,
            deadline_type: DeadlineType::Rolling,
            deadline_date: None,
            deadline_text: None,
            is_national: true,
            states_json: "[]".into(),
            entity_types_json: "[]".into(),
            industries_json: "[]".into(),
            restrictions_json: "[]".into(),
            requirements_json: "[]".into(),
            categories_json: serde_json::to_string(&["Agriculture"]).unwrap(),
            status: GrantStatus::Open,
            hash_fingerprint: "fp".into(),
            quality_score: 80,
            link_status: LinkStatus::Active,
            last_verified_at: Utc::now(),
            first_seen_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            entity_type: Some(EntityType::Nonprofit),
            state: Some("CA".into()),
            industry_tags: vec!["agriculture".into()],
            certifications: Vec::new(),
            annual_budget: None,
        }
    }

    #[test]
    fn open_grant_passes_status() {
        let r = grant_status(&grant(), &EngineConfig::default());
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn closed_grant_fails_status() {
        let mut g = grant();
        g.status = GrantStatus::Closed;
        let r = grant_status(&g, &EngineConfig::default());
        assert!(!r.passes);
        assert!(r.reason.is_some());
    }

    #[test]
    fn forecasted_passes_low_when_allowed_else_fails() {
        let mut g = grant();
        g.status = GrantStatus::Forecasted;
        let allowed = grant_status(&g, &EngineConfig::default());
        assert!(allowed.passes);
        assert_eq!(allowed.confidence, Confidence::Low);

        let strict = grant_status(
            &g,
            &EngineConfig {
                allow_unknown_status: false,
                ..Default::default()
            },
        );
        assert!(!strict.passes);
    }

    #[test]
    fn invalid_url_fails() {
        let mut g = grant();
        g.url = "not a url".into();
        assert!(!url_exists(&g, &EngineConfig::default()).passes);
    }

    #[test]
    fn missing_url_configurable() {
        let mut g = grant();
        g.url = String::new();
        let lenient = url_exists(&g, &EngineConfig::default());
        assert!(lenient.passes);
        assert_eq!(lenient.confidence, Confidence::Low);

        let strict = url_exists(
            &g,
            &EngineConfig {
                require_apply_url: true,
                ..Default::default()
            },
        );
        assert!(!strict.passes);
    }

    #[test]
    fn quality_tiers() {
        let mut g = grant();
        g.quality_score = 20;
        assert!(!data_quality(&g).passes);
        g.quality_score = 45;
        let mid = data_quality(&g);
        assert!(mid.passes);
        assert_eq!(mid.confidence, Confidence::Medium);
        g.quality_score = 85;
        assert_eq!(data_quality(&g).confidence, Confidence::High);
    }

    #[test]
    fn no_entity_tags_is_open_to_all() {
        let r = entity_type(&profile(), &grant());
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::Medium);
    }

    #[test]
    fn declared_entity_match_passes_high() {
        let mut g = grant();
        g.entity_types_json =
            serde_json::to_string(&[EntityType::Nonprofit, EntityType::Educational]).unwrap();
        let r = entity_type(&profile(), &g);
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn declared_entity_mismatch_fails_with_declared_types_in_reason() {
        let mut g = grant();
        g.entity_types_json = serde_json::to_string(&[EntityType::Government]).unwrap();
        let r = entity_type(&profile(), &g);
        assert!(!r.passes);
        assert!(r.reason.unwrap().contains("government"));
    }

    #[test]
    fn national_grant_passes_geography_high() {
        let r = geography(&profile(), &grant());
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn no_location_data_assumed_national() {
        let mut g = grant();
        g.is_national = false;
        let r = geography(&profile(), &g);
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::Medium);
    }

    #[test]
    fn state_restricted_grant_without_match_fails_listing_states() {
        let mut g = grant();
        g.is_national = false;
        g.states_json = serde_json::to_string(&["TX", "OK", "NM", "AZ"]).unwrap();
        let r = geography(&profile(), &g);
        assert!(!r.passes);
        let reason = r.reason.unwrap();
        assert!(reason.contains("TX"));
        assert!(!reason.contains("AZ"), "only three states listed");
    }

    #[test]
    fn state_match_passes() {
        let mut g = grant();
        g.is_national = false;
        g.states_json = serde_json::to_string(&["CA", "OR"]).unwrap();
        assert!(geography(&profile(), &g).passes);
    }

    #[test]
    fn exclusion_phrase_fails_regardless() {
        let mut g = grant();
        g.description = "Open to many applicants. Nonprofits are not eligible.".into();
        let r = explicit_exclusions(&profile(), &g);
        assert!(!r.passes);
    }

    #[test]
    fn exclusion_in_restrictions_field_detected() {
        let mut g = grant();
        g.restrictions_json = serde_json::to_string(&["Not open to nonprofit entities"]).unwrap();
        let r = explicit_exclusions(&profile(), &g);
        assert!(!r.passes);
    }

    #[test]
    fn clean_text_passes_exclusions() {
        assert!(explicit_exclusions(&profile(), &grant()).passes);
    }

    #[test]
    fn category_name_match_passes_high() {
        let r = industry_relevance(&profile(), &grant());
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn keyword_density_two_hits_is_high() {
        let mut g = grant();
        g.categories_json = "[]".into();
        g.description = "Funding for farm equipment and crop insurance programs.".into();
        let r = industry_relevance(&profile(), &g);
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn single_keyword_hit_is_medium() {
        let mut g = grant();
        g.categories_json = "[]".into();
        g.title = "Rural Development Fund".into();
        g.description = "General support for local projects and community work.".into();
        let r = industry_relevance(&profile(), &g);
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::Medium);
    }

    #[test]
    fn exclusion_hit_without_positive_fails_tag_but_other_tag_can_pass() {
        let mut g = grant();
        g.categories_json = "[]".into();
        g.title = "Urban Transit Technology Fund".into();
        g.description = "Software and digital innovation for urban transit systems.".into();
        let mut p = profile();
        p.industry_tags = vec!["agriculture".into(), "technology".into()];
        let r = industry_relevance(&p, &g);
        assert!(r.passes, "technology tag should rescue the verdict");
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn exclusion_hit_alone_fails_filter() {
        let mut g = grant();
        g.categories_json = "[]".into();
        g.title = "Metro Fund".into();
        g.description = "Exclusively for urban transit operators in metropolitan regions.".into();
        let r = industry_relevance(&profile(), &g);
        assert!(!r.passes);
    }

    #[test]
    fn no_profile_tags_passes_medium() {
        let mut p = profile();
        p.industry_tags.clear();
        let r = industry_relevance(&p, &grant());
        assert!(r.passes);
        assert_eq!(r.confidence, Confidence::Medium);
    }
}
