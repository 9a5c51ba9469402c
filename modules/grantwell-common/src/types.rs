use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CrawlType {
    Api,
    Scrape,
    Feed,
}

impl std::fmt::Display for CrawlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlType::Api => write!(f, "api"),
            CrawlType::Scrape => write!(f, "scrape"),
            CrawlType::Feed => write!(f, "feed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FundingType {
    Grant,
    Loan,
    Rebate,
    TaxCredit,
    ForgivableLoan,
    #[default]
    Unknown,
}

impl std::fmt::Display for FundingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundingType::Grant => write!(f, "grant"),
            FundingType::Loan => write!(f, "loan"),
            FundingType::Rebate => write!(f, "rebate"),
            FundingType::TaxCredit => write!(f, "tax_credit"),
            FundingType::ForgivableLoan => write!(f, "forgivable_loan"),
            FundingType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    /// Specific closing date.
    Fixed,
    /// No fixed date; applications accepted continuously, never expires.
    Rolling,
    #[default]
    Unknown,
}

impl std::fmt::Display for DeadlineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadlineType::Fixed => write!(f, "fixed"),
            DeadlineType::Rolling => write!(f, "rolling"),
            DeadlineType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Forecasted,
    Open,
    Closed,
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantStatus::Forecasted => write!(f, "forecasted"),
            GrantStatus::Open => write!(f, "open"),
            GrantStatus::Closed => write!(f, "closed"),
        }
    }
}

impl GrantStatus {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "forecasted" | "forecast" | "upcoming" => Some(Self::Forecasted),
            "open" | "active" | "posted" | "accepting" => Some(Self::Open),
            "closed" | "expired" | "archived" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Broken,
    #[default]
    Unknown,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Active => write!(f, "active"),
            LinkStatus::Broken => write!(f, "broken"),
            LinkStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Nonprofit,
    SmallBusiness,
    Individual,
    ForProfit,
    Educational,
    Government,
    Tribal,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Nonprofit => write!(f, "nonprofit"),
            EntityType::SmallBusiness => write!(f, "small_business"),
            EntityType::Individual => write!(f, "individual"),
            EntityType::ForProfit => write!(f, "for_profit"),
            EntityType::Educational => write!(f, "educational"),
            EntityType::Government => write!(f, "government"),
            EntityType::Tribal => write!(f, "tribal"),
        }
    }
}

impl EntityType {
    /// Tag spellings that count as compatible with this entity type when a grant
    /// declares its audience in free-form text.
    pub fn compatible_tags(&self) -> &'static [&'static str] {
        match self {
            EntityType::Nonprofit => &["nonprofit", "non profit", "501c3", "charity", "ngo"],
            EntityType::SmallBusiness => &[
                "small business",
                "for profit",
                "smb",
                "sole proprietor",
                "startup",
            ],
            EntityType::Individual => &["individual", "person", "sole proprietor"],
            EntityType::ForProfit => &["for profit", "business", "corporation", "llc"],
            EntityType::Educational => &["educational", "school", "university", "college"],
            EntityType::Government => &["government", "municipality", "public agency", "state"],
            EntityType::Tribal => &["tribal", "tribe", "native american", "indigenous"],
        }
    }
}

// --- Extraction output (strict schema, see extractor) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct FundingInfo {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub text: Option<String>,
    #[serde(default)]
    pub funding_type: FundingType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct DeadlineInfo {
    #[serde(default)]
    pub deadline_type: DeadlineType,
    pub date: Option<NaiveDate>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct GeographyInfo {
    pub is_national: bool,
    /// Two-letter state codes. Empty when is_national or unknown.
    #[serde(default)]
    pub states: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct EligibilityInfo {
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub restrictions: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// A structured grant candidate produced by extraction, before validation
/// and persistence. Absent facts stay empty; extraction never infers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedGrant {
    pub title: String,
    pub sponsor: String,
    pub description: String,
    pub apply_url: String,
    #[serde(default)]
    pub funding: FundingInfo,
    #[serde(default)]
    pub deadline: DeadlineInfo,
    #[serde(default)]
    pub geography: GeographyInfo,
    #[serde(default)]
    pub eligibility: EligibilityInfo,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Explicit status signal from the source, if it publishes one.
    pub source_status: Option<GrantStatus>,
    /// 0-100. Selector strategies report 100; model-assisted strategies self-report.
    pub extraction_confidence: u8,
}

impl ExtractedGrant {
    /// Identity of the candidate within its source. Set by the adapter;
    /// falls back to the apply URL when the source has no native ID.
    pub fn source_identity<'a>(&'a self, native_id: Option<&'a str>) -> &'a str {
        native_id.unwrap_or(&self.apply_url)
    }
}

// --- Validation verdict ---

/// Quality/validity verdict for one candidate, computed once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub has_title: bool,
    pub has_sponsor: bool,
    pub has_description: bool,
    pub apply_url_valid: bool,
    pub apply_url_live: bool,
    pub has_deadline: bool,
    pub deadline_not_expired: bool,
    pub has_funding_info: bool,
    pub has_eligibility_info: bool,
    pub has_geography_info: bool,
    pub quality_score: u8,
    pub is_valid: bool,
    pub is_duplicate: bool,
    /// Fingerprint of the existing record this candidate duplicates, if any.
    pub duplicate_of: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

// --- Canonical persisted record ---

/// The canonical, persisted representation of a grant. Identity is
/// `(source_name, source_id)`; never deleted, status-only lifecycle with
/// monotonic open → closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedGrant {
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    pub sponsor: String,
    pub description: String,
    pub url: String,
    pub funding_min: Option<f64>,
    pub funding_max: Option<f64>,
    pub funding_text: Option<String>,
    pub funding_type: FundingType,
    pub deadline_type: DeadlineType,
    pub deadline_date: Option<NaiveDate>,
    pub deadline_text: Option<String>,
    pub is_national: bool,
    /// JSON-encoded list fields for storage.
    pub states_json: String,
    pub entity_types_json: String,
    pub industries_json: String,
    pub restrictions_json: String,
    pub requirements_json: String,
    pub categories_json: String,
    pub status: GrantStatus,
    pub hash_fingerprint: String,
    pub quality_score: u8,
    pub link_status: LinkStatus,
    pub last_verified_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NormalizedGrant {
    pub fn key(&self) -> (String, String) {
        (self.source_name.clone(), self.source_id.clone())
    }

    pub fn states(&self) -> Vec<String> {
        serde_json::from_str(&self.states_json).unwrap_or_default()
    }

    pub fn entity_types(&self) -> Vec<EntityType> {
        serde_json::from_str(&self.entity_types_json).unwrap_or_default()
    }

    pub fn industries(&self) -> Vec<String> {
        serde_json::from_str(&self.industries_json).unwrap_or_default()
    }

    pub fn restrictions(&self) -> Vec<String> {
        serde_json::from_str(&self.restrictions_json).unwrap_or_default()
    }

    pub fn categories(&self) -> Vec<String> {
        serde_json::from_str(&self.categories_json).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_status_from_loose_strings() {
        assert_eq!(GrantStatus::from_str_loose("Open"), Some(GrantStatus::Open));
        assert_eq!(
            GrantStatus::from_str_loose("posted"),
            Some(GrantStatus::Open)
        );
        assert_eq!(
            GrantStatus::from_str_loose("ARCHIVED"),
            Some(GrantStatus::Closed)
        );
        assert_eq!(
            GrantStatus::from_str_loose("forecast"),
            Some(GrantStatus::Forecasted)
        );
        assert_eq!(GrantStatus::from_str_loose("???"), None);
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&FundingType::TaxCredit).unwrap(),
            "\"tax_credit\""
        );
        assert_eq!(
            serde_json::to_string(&EntityType::SmallBusiness).unwrap(),
            "\"small_business\""
        );
        assert_eq!(
            serde_json::to_string(&DeadlineType::Rolling).unwrap(),
            "\"rolling\""
        );
    }

    #[test]
    fn extracted_grant_deserializes_with_defaults() {
        let json = r#"{
            "title": "Rural Energy Grant",
            "sponsor": "USDA",
            "description": "Funding for rural energy projects.",
            "apply_url": "https://example.gov/apply",
            "source_status": null,
            "extraction_confidence": 90
        }"#;
        let g: ExtractedGrant = serde_json::from_str(json).unwrap();
        assert_eq!(g.funding.funding_type, FundingType::Unknown);
        assert_eq!(g.deadline.deadline_type, DeadlineType::Unknown);
        assert!(g.geography.states.is_empty());
        assert!(g.eligibility.entity_types.is_empty());
    }

    #[test]
    fn normalized_grant_json_fields_round_trip() {
        let g = NormalizedGrant {
            source_id: "ABC-1".into(),
            source_name: "grants_gov".into(),
            title: "T".into(),
            sponsor: "S".into(),
            description: "D".into(),
            url: "https://example.gov".into(),
            funding_min: None,
            funding_max: None,
            funding_text: None,
            funding_type: FundingType::Grant,
            deadline_type: DeadlineType::Rolling,
            deadline_date: None,
            deadline_text: None,
            is_national: true,
            states_json: serde_json::to_string(&["CA", "TX"]).unwrap(),
            entity_types_json: serde_json::to_string(&[EntityType::Nonprofit]).unwrap(),
            industries_json: "[]".into(),
            restrictions_json: "[]".into(),
            requirements_json: "[]".into(),
            categories_json: serde_json::to_string(&["Agriculture"]).unwrap(),
            status: GrantStatus::Open,
            hash_fingerprint: "deadbeef".into(),
            quality_score: 80,
            link_status: LinkStatus::Active,
            last_verified_at: Utc::now(),
            first_seen_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(g.states(), vec!["CA", "TX"]);
        assert_eq!(g.entity_types(), vec![EntityType::Nonprofit]);
        assert_eq!(g.categories(), vec!["Agriculture"]);
    }
}
