//! Source adapters: one per crawl type, all producing the same raw shape so
//! the rest of the pipeline never cares how a source is crawled.

use async_trait::async_trait;
use grantwell_common::types::{
    CrawlType, DeadlineInfo, EligibilityInfo, ExtractedGrant, FundingInfo, FundingType,
    GeographyInfo,
};
use grantwell_common::IngestError;
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::selector::{next_page_url, split_items};
use crate::extract::text::{parse_deadline_text, parse_funding_text};
use crate::fetcher::{content_hash, Fetcher, RateLimiter};
use crate::registry::SourceConfig;

/// One fetched listing page, split into per-grant records.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    /// Hash of the page body, for unchanged-content short-circuiting.
    pub content_hash: String,
    pub records: Vec<RawRecord>,
}

/// One source-native record awaiting extraction.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// The source's own record ID, when it publishes one up front.
    pub source_id: Option<String>,
    pub unit: RawUnit,
}

/// The raw payload of a record, shaped by how the source was crawled.
#[derive(Debug, Clone)]
pub enum RawUnit {
    /// One JSON record from a structured API response.
    Json(Value),
    /// One HTML fragment split out of a listing page.
    Html(String),
    /// One feed entry, already reduced to a candidate by the feed parser.
    Entry(Box<ExtractedGrant>),
}

/// Crawl-type-specific fetching. Adapters own pagination and item splitting;
/// they never validate, dedup, or persist.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(
        &self,
        fetcher: &Fetcher,
        limiter: &RateLimiter,
    ) -> Result<Vec<RawPage>, IngestError>;
}

/// Pick the adapter for a source's crawl type.
pub fn adapter_for(config: &SourceConfig) -> Box<dyn SourceAdapter> {
    match config.crawl_type {
        CrawlType::Api => Box::new(ApiAdapter {
            config: config.clone(),
        }),
        CrawlType::Scrape => Box::new(ScrapeAdapter {
            config: config.clone(),
        }),
        CrawlType::Feed => Box::new(FeedAdapter {
            config: config.clone(),
        }),
    }
}

// --- API adapter ---

/// Offset/limit pagination against a JSON endpoint.
pub struct ApiAdapter {
    config: SourceConfig,
}

const API_PAGE_SIZE: usize = 100;

#[async_trait]
impl SourceAdapter for ApiAdapter {
    async fn fetch(
        &self,
        fetcher: &Fetcher,
        limiter: &RateLimiter,
    ) -> Result<Vec<RawPage>, IngestError> {
        let map = self
            .config
            .api_map
            .as_ref()
            .ok_or_else(|| IngestError::Config(format!("{}: API source has no field map", self.config.id)))?;

        let limit = API_PAGE_SIZE.min(self.config.max_records.max(1));
        let mut pages = Vec::new();
        let mut offset = 0usize;
        let mut total = 0usize;

        for _ in 0..self.config.max_pages {
            let url = self
                .config
                .endpoint
                .replace("{offset}", &offset.to_string())
                .replace("{limit}", &limit.to_string());
            let (body, _status) = fetcher.fetch_text(limiter, &url).await?;
            let hash = content_hash(&body);
            let json: Value = serde_json::from_str(&body).map_err(|e| IngestError::Fetch {
                url: url.clone(),
                message: format!("response is not valid JSON: {e}"),
            })?;

            let records: Vec<Value> = match json.pointer(&map.records_pointer) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            let count = records.len();
            debug!(source = %self.config.id, url, count, "Fetched API page");
            if count == 0 {
                break;
            }

            pages.push(RawPage {
                url,
                content_hash: hash,
                records: records
                    .into_iter()
                    .map(|r| RawRecord {
                        source_id: None,
                        unit: RawUnit::Json(r),
                    })
                    .collect(),
            });

            total += count;
            offset += count;
            if total >= self.config.max_records || count < limit {
                break;
            }
        }

        Ok(pages)
    }
}

// --- Scrape adapter ---

/// Listing-page crawling with next-page link following.
pub struct ScrapeAdapter {
    config: SourceConfig,
}

#[async_trait]
impl SourceAdapter for ScrapeAdapter {
    async fn fetch(
        &self,
        fetcher: &Fetcher,
        limiter: &RateLimiter,
    ) -> Result<Vec<RawPage>, IngestError> {
        let selectors = self
            .config
            .selectors
            .as_ref()
            .ok_or_else(|| IngestError::Config(format!("{}: scrape source has no selectors", self.config.id)))?;

        let mut pages = Vec::new();
        let mut total = 0usize;
        let mut url = self.config.endpoint.clone();

        for _ in 0..self.config.max_pages {
            let (body, _status) = fetcher.fetch_text(limiter, &url).await?;
            let hash = content_hash(&body);
            let items = split_items(&body, &selectors.item)?;
            debug!(source = %self.config.id, url, count = items.len(), "Fetched listing page");
            if items.is_empty() {
                break;
            }

            total += items.len();
            pages.push(RawPage {
                url: url.clone(),
                content_hash: hash,
                records: items
                    .into_iter()
                    .map(|fragment| RawRecord {
                        source_id: None,
                        unit: RawUnit::Html(fragment),
                    })
                    .collect(),
            });
            if total >= self.config.max_records {
                break;
            }

            let next = match &selectors.next_page {
                Some(sel) => next_page_url(&body, sel, &url)?,
                None => None,
            };
            match next {
                Some(n) if n != url => url = n,
                _ => break,
            }
        }

        Ok(pages)
    }
}

// --- Feed adapter ---

/// RSS/Atom feeds. Entries carry enough structure to map directly.
pub struct FeedAdapter {
    config: SourceConfig,
}

const FEED_CONFIDENCE: u8 = 70;

#[async_trait]
impl SourceAdapter for FeedAdapter {
    async fn fetch(
        &self,
        fetcher: &Fetcher,
        limiter: &RateLimiter,
    ) -> Result<Vec<RawPage>, IngestError> {
        let (body, _status) = fetcher.fetch_text(limiter, &self.config.endpoint).await?;
        let hash = content_hash(&body);
        let feed = feed_rs::parser::parse(body.as_bytes())
            .map_err(|e| IngestError::Extraction(format!("feed parse failed: {e}")))?;

        let feed_title = feed.title.as_ref().map(|t| t.content.clone());
        let mut records = Vec::new();
        for entry in feed.entries.into_iter().take(self.config.max_records) {
            match map_feed_entry(&entry, &self.config, feed_title.as_deref()) {
                Some(candidate) => records.push(RawRecord {
                    source_id: Some(entry.id.clone()),
                    unit: RawUnit::Entry(Box::new(candidate)),
                }),
                None => {
                    warn!(source = %self.config.id, entry = %entry.id, "Feed entry missing title or link, skipped");
                }
            }
        }

        Ok(vec![RawPage {
            url: self.config.endpoint.clone(),
            content_hash: hash,
            records,
        }])
    }
}

fn map_feed_entry(
    entry: &feed_rs::model::Entry,
    config: &SourceConfig,
    feed_title: Option<&str>,
) -> Option<ExtractedGrant> {
    let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
    let apply_url = entry.links.first().map(|l| l.href.clone())?;
    if title.is_empty() || apply_url.is_empty() {
        return None;
    }

    let description = entry
        .summary
        .as_ref()
        .map(|s| strip_tags(&s.content))
        .unwrap_or_default();

    // Feeds bury deadlines in the summary prose, if anywhere.
    let deadline = description
        .lines()
        .find(|line| line.to_lowercase().contains("deadline"))
        .map(parse_deadline_text)
        .unwrap_or_else(DeadlineInfo::default);

    let (min, max) = parse_funding_text(&description);

    Some(ExtractedGrant {
        title,
        sponsor: config
            .default_sponsor
            .clone()
            .or_else(|| feed_title.map(str::to_string))
            .unwrap_or_default(),
        description,
        apply_url,
        funding: FundingInfo {
            min,
            max,
            text: None,
            funding_type: FundingType::Grant,
        },
        deadline,
        geography: GeographyInfo {
            states: Vec::new(),
            is_national: config.default_national,
        },
        eligibility: EligibilityInfo::default(),
        categories: Vec::new(),
        source_status: None,
        extraction_confidence: FEED_CONFIDENCE,
    })
}

/// Crude tag stripper for feed summaries that embed HTML.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
