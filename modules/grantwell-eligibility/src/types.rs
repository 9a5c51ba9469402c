use serde::{Deserialize, Serialize};

/// The seven filters, in the fixed order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterName {
    GrantStatus,
    UrlExists,
    DataQuality,
    EntityType,
    Geography,
    ExplicitExclusions,
    IndustryRelevance,
}

impl FilterName {
    pub const ORDERED: [FilterName; 7] = [
        FilterName::GrantStatus,
        FilterName::UrlExists,
        FilterName::DataQuality,
        FilterName::EntityType,
        FilterName::Geography,
        FilterName::ExplicitExclusions,
        FilterName::IndustryRelevance,
    ];
}

impl std::fmt::Display for FilterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterName::GrantStatus => write!(f, "GRANT_STATUS"),
            FilterName::UrlExists => write!(f, "URL_EXISTS"),
            FilterName::DataQuality => write!(f, "DATA_QUALITY"),
            FilterName::EntityType => write!(f, "ENTITY_TYPE"),
            FilterName::Geography => write!(f, "GEOGRAPHY"),
            FilterName::ExplicitExclusions => write!(f, "EXPLICIT_EXCLUSIONS"),
            FilterName::IndustryRelevance => write!(f, "INDUSTRY_RELEVANCE"),
        }
    }
}

/// How certain a verdict is, independent of pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Rank for "lowest confidence observed" aggregation. Low < Medium < High.
    pub fn rank(&self) -> u8 {
        match self {
            Confidence::Low => 0,
            Confidence::Medium => 1,
            Confidence::High => 2,
        }
    }

    pub fn min(self, other: Confidence) -> Confidence {
        if self.rank() <= other.rank() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Verdict of one filter for one (profile, grant) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub filter: FilterName,
    pub passes: bool,
    /// Human-readable explanation. Always present on failure; present on a
    /// pass only when the pass is uncertain (surfaces as a warning).
    pub reason: Option<String>,
    pub confidence: Confidence,
    /// Structured supporting facts (matched tags, eligible states, hit counts).
    pub details: Vec<String>,
}

impl EligibilityResult {
    pub fn pass(filter: FilterName, confidence: Confidence) -> Self {
        Self {
            filter,
            passes: true,
            reason: None,
            confidence,
            details: Vec::new(),
        }
    }

    pub fn pass_with_reason(
        filter: FilterName,
        confidence: Confidence,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            filter,
            passes: true,
            reason: Some(reason.into()),
            confidence,
            details: Vec::new(),
        }
    }

    pub fn fail(
        filter: FilterName,
        confidence: Confidence,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            filter,
            passes: false,
            reason: Some(reason.into()),
            confidence,
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

/// Aggregate verdict across all filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullEligibilityResult {
    pub is_eligible: bool,
    pub passed_filters: Vec<FilterName>,
    pub failed_filters: Vec<FilterName>,
    /// Per-filter results in run order, all seven always present.
    pub results: Vec<EligibilityResult>,
    /// Lowest confidence among passing filters when eligible; high otherwise.
    pub confidence_level: Confidence,
    /// Reasons attached to passing-but-uncertain filters.
    pub warnings: Vec<String>,
    /// At most two, generated from missing profile fields.
    pub suggestions: Vec<String>,
}

/// Engine knobs. Defaults mirror the ingestion config defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether a grant whose openness is uncertain (forecasted) passes
    /// GRANT_STATUS at low confidence instead of failing.
    pub allow_unknown_status: bool,
    /// Whether a missing apply URL fails URL_EXISTS.
    pub require_apply_url: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_unknown_status: true,
            require_apply_url: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_min_picks_lowest() {
        assert_eq!(Confidence::High.min(Confidence::Low), Confidence::Low);
        assert_eq!(Confidence::Medium.min(Confidence::High), Confidence::Medium);
        assert_eq!(Confidence::High.min(Confidence::High), Confidence::High);
    }

    #[test]
    fn filter_names_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&FilterName::ExplicitExclusions).unwrap(),
            "\"EXPLICIT_EXCLUSIONS\""
        );
        assert_eq!(FilterName::GrantStatus.to_string(), "GRANT_STATUS");
    }

    #[test]
    fn ordered_covers_all_filters_once() {
        let mut seen = std::collections::HashSet::new();
        for f in FilterName::ORDERED {
            assert!(seen.insert(f.to_string()));
        }
        assert_eq!(seen.len(), 7);
    }
}
