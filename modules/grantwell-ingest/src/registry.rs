//! Static catalog of source descriptors. Loaded at startup, immutable during
//! a run. New sources register through `SourceRegistry::register`.

use grantwell_common::types::CrawlType;

/// Per-source rate limit: minimum inter-request delay plus a concurrency cap.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub delay_ms: u64,
    pub max_concurrent: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            max_concurrent: 2,
        }
    }
}

/// JSON-pointer field map for API sources. Pointers are relative to one record.
#[derive(Debug, Clone, Default)]
pub struct ApiFieldMap {
    /// Pointer to the record array within a response page.
    pub records_pointer: String,
    pub id: String,
    pub title: String,
    pub sponsor: String,
    pub description: String,
    pub apply_url: String,
    pub deadline: Option<String>,
    pub status: Option<String>,
    pub funding_min: Option<String>,
    pub funding_max: Option<String>,
    pub categories: Option<String>,
    pub states: Option<String>,
    pub entity_types: Option<String>,
}

/// CSS selectors for scrape sources. `item` splits a listing page into
/// per-grant fragments; the rest select fields within one fragment.
#[derive(Debug, Clone, Default)]
pub struct ScrapeSelectors {
    pub item: String,
    pub title: String,
    pub link: String,
    pub sponsor: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub amount: Option<String>,
    /// Selector for the "next page" anchor on a listing page.
    pub next_page: Option<String>,
}

/// One external grant source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub crawl_type: CrawlType,
    /// Endpoint or listing URL. API endpoints may carry `{offset}` and
    /// `{limit}` placeholders for pagination.
    pub endpoint: String,
    pub rate: RateLimitConfig,
    /// Safety caps on pagination.
    pub max_pages: usize,
    pub max_records: usize,
    pub api_map: Option<ApiFieldMap>,
    pub selectors: Option<ScrapeSelectors>,
    /// Sponsor to assume when the source never names one (foundation sites).
    pub default_sponsor: Option<String>,
    /// Whether this source lists nationwide programs by default.
    pub default_national: bool,
    pub schedule_hours: u32,
    pub enabled: bool,
}

/// Catalog of configured sources, keyed by id.
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for source in builtin_sources() {
            registry.register(source);
        }
        registry
    }

    /// Register a source. Replaces any existing source with the same id.
    pub fn register(&mut self, source: SourceConfig) {
        self.sources.retain(|s| s.id != source.id);
        self.sources.push(source);
    }

    pub fn get(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn all_enabled(&self) -> Vec<&SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            id: "grants_gov".into(),
            name: "Grants.gov".into(),
            crawl_type: CrawlType::Api,
            endpoint: "https://api.grants.gov/v1/api/search2?rows={limit}&startRecordNum={offset}"
                .into(),
            rate: RateLimitConfig {
                delay_ms: 500,
                max_concurrent: 2,
            },
            max_pages: 20,
            max_records: 1000,
            api_map: Some(ApiFieldMap {
                records_pointer: "/data/oppHits".into(),
                id: "/id".into(),
                title: "/title".into(),
                sponsor: "/agencyName".into(),
                description: "/synopsis".into(),
                apply_url: "/applyUrl".into(),
                deadline: Some("/closeDate".into()),
                status: Some("/oppStatus".into()),
                funding_min: Some("/awardFloor".into()),
                funding_max: Some("/awardCeiling".into()),
                categories: Some("/categories".into()),
                states: None,
                entity_types: Some("/eligibleApplicants".into()),
            }),
            selectors: None,
            default_sponsor: None,
            default_national: true,
            schedule_hours: 24,
            enabled: true,
        },
        SourceConfig {
            id: "ca_grants_portal".into(),
            name: "California Grants Portal".into(),
            crawl_type: CrawlType::Scrape,
            endpoint: "https://www.grants.ca.gov/grants/".into(),
            rate: RateLimitConfig {
                delay_ms: 2000,
                max_concurrent: 1,
            },
            max_pages: 10,
            max_records: 500,
            api_map: None,
            selectors: Some(ScrapeSelectors {
                item: "article.grant-listing".into(),
                title: "h3 a".into(),
                link: "h3 a".into(),
                sponsor: Some(".grant-agency".into()),
                description: Some(".grant-summary".into()),
                deadline: Some(".grant-deadline".into()),
                amount: Some(".grant-amount".into()),
                next_page: Some("a.next.page-numbers".into()),
            }),
            default_sponsor: Some("State of California".into()),
            default_national: false,
            schedule_hours: 24,
            enabled: true,
        },
        SourceConfig {
            id: "rural_health_feed".into(),
            name: "Rural Health Funding Feed".into(),
            crawl_type: CrawlType::Feed,
            endpoint: "https://www.ruralhealthinfo.org/rss/funding.xml".into(),
            rate: RateLimitConfig {
                delay_ms: 1000,
                max_concurrent: 1,
            },
            max_pages: 1,
            max_records: 200,
            api_map: None,
            selectors: None,
            default_sponsor: None,
            default_national: true,
            schedule_hours: 12,
            enabled: true,
        },
    ]
}
