//! Aggregation over the seven filters.
//!
//! `evaluate` is a pure function of (profile, grant, config): called twice with
//! the same inputs it returns identical output. All filters always run so the
//! caller gets the full explanation set, not just the first failure.

use std::collections::HashMap;

use grantwell_common::types::NormalizedGrant;

use crate::filters;
use crate::profile::UserProfile;
use crate::types::{Confidence, EligibilityResult, EngineConfig, FilterName, FullEligibilityResult};

/// Run all filters in order and aggregate the verdict.
pub fn evaluate(
    profile: &UserProfile,
    grant: &NormalizedGrant,
    config: &EngineConfig,
) -> FullEligibilityResult {
    let results: Vec<EligibilityResult> = FilterName::ORDERED
        .iter()
        .map(|filter| match filter {
            FilterName::GrantStatus => filters::grant_status(grant, config),
            FilterName::UrlExists => filters::url_exists(grant, config),
            FilterName::DataQuality => filters::data_quality(grant),
            FilterName::EntityType => filters::entity_type(profile, grant),
            FilterName::Geography => filters::geography(profile, grant),
            FilterName::ExplicitExclusions => filters::explicit_exclusions(profile, grant),
            FilterName::IndustryRelevance => filters::industry_relevance(profile, grant),
        })
        .collect();

    aggregate(profile, results)
}

fn aggregate(profile: &UserProfile, results: Vec<EligibilityResult>) -> FullEligibilityResult {
    let passed_filters: Vec<FilterName> =
        results.iter().filter(|r| r.passes).map(|r| r.filter).collect();
    let failed_filters: Vec<FilterName> =
        results.iter().filter(|r| !r.passes).map(|r| r.filter).collect();
    let is_eligible = failed_filters.is_empty();

    let confidence_level = if is_eligible {
        results
            .iter()
            .filter(|r| r.passes)
            .map(|r| r.confidence)
            .fold(Confidence::High, Confidence::min)
    } else {
        Confidence::High
    };

    let warnings: Vec<String> = results
        .iter()
        .filter(|r| r.passes && r.confidence != Confidence::High)
        .filter_map(|r| r.reason.clone())
        .collect();

    FullEligibilityResult {
        is_eligible,
        passed_filters,
        failed_filters,
        results,
        confidence_level,
        warnings,
        suggestions: suggestions_for(profile),
    }
}

/// Profile-completeness suggestions, independent of filter outcomes. Max two.
fn suggestions_for(profile: &UserProfile) -> Vec<String> {
    let mut suggestions = Vec::new();
    if profile.entity_type.is_none() {
        suggestions.push(
            "Add your entity type (nonprofit, small business, …) to check entity restrictions"
                .to_string(),
        );
    }
    if profile.normalized_state().is_none() {
        suggestions
            .push("Add your state to check geographic restrictions".to_string());
    }
    if profile.industry_tags.len() <= 1 {
        suggestions.push(
            "Add more industry tags to improve relevance matching".to_string(),
        );
    }
    suggestions.truncate(2);
    suggestions
}

/// Batch evaluation keyed by `(source_name, source_id)` identity.
pub fn evaluate_many(
    profile: &UserProfile,
    grants: &[NormalizedGrant],
    config: &EngineConfig,
) -> HashMap<String, FullEligibilityResult> {
    grants
        .iter()
        .map(|g| {
            (
                format!("{}:{}", g.source_name, g.source_id),
                evaluate(profile, g, config),
            )
        })
        .collect()
}

/// Convenience partition of a grant list into eligible and ineligible, with
/// per-filter failure counts.
#[derive(Debug, Default)]
pub struct EligibilityPartition {
    pub eligible: Vec<NormalizedGrant>,
    /// Ineligible grants with the first failing filter's reason.
    pub ineligible: Vec<(NormalizedGrant, String)>,
    pub failures_by_filter: HashMap<FilterName, u32>,
}

pub fn filter_eligible(
    profile: &UserProfile,
    grants: &[NormalizedGrant],
    config: &EngineConfig,
) -> EligibilityPartition {
    let mut partition = EligibilityPartition::default();
    for grant in grants {
        let verdict = evaluate(profile, grant, config);
        if verdict.is_eligible {
            partition.eligible.push(grant.clone());
        } else {
            for filter in &verdict.failed_filters {
                *partition.failures_by_filter.entry(*filter).or_insert(0) += 1;
            }
            let reason = verdict
                .results
                .iter()
                .find(|r| !r.passes)
                .and_then(|r| r.reason.clone())
                .unwrap_or_else(|| "Ineligible".to_string());
            partition.ineligible.push((grant.clone(), reason));
        }
    }
    partition
}
