//! CSS-selector extraction for scrape sources.

use async_trait::async_trait;
use grantwell_common::types::{
    EligibilityInfo, ExtractedGrant, FundingInfo, FundingType, GeographyInfo,
};
use grantwell_common::IngestError;
use scraper::{Html, Selector};
use url::Url;

use crate::extract::text::{parse_deadline_text, parse_funding_text};
use crate::extract::{ExtractionStrategy, StrategyHints};

/// Deterministic selector-driven extraction. Confidence starts at a floor for
/// a title plus a link and climbs as optional fields resolve.
pub struct SelectorStrategy;

const BASE_CONFIDENCE: u8 = 60;
const FIELD_CONFIDENCE: u8 = 10;

#[async_trait]
impl ExtractionStrategy for SelectorStrategy {
    async fn extract(
        &self,
        raw_text: &str,
        hints: &StrategyHints<'_>,
    ) -> Result<ExtractedGrant, IngestError> {
        // Html is not Send; all parsing happens synchronously before any await.
        extract_fragment(raw_text, hints)
    }

    fn name(&self) -> &str {
        "selector"
    }
}

fn extract_fragment(
    fragment: &str,
    hints: &StrategyHints<'_>,
) -> Result<ExtractedGrant, IngestError> {
    let selectors = hints
        .selectors
        .ok_or_else(|| IngestError::Config("scrape source has no selectors".into()))?;
    let doc = Html::parse_fragment(fragment);

    let title = select_text(&doc, &selectors.title)?
        .ok_or_else(|| IngestError::Extraction("no title matched".into()))?;
    let href = select_href(&doc, &selectors.link)?
        .ok_or_else(|| IngestError::Extraction("no link matched".into()))?;
    let apply_url = resolve_url(hints.base_url, &href)?;

    let sponsor = match &selectors.sponsor {
        Some(sel) => select_text(&doc, sel)?,
        None => None,
    };
    let description = match &selectors.description {
        Some(sel) => select_text(&doc, sel)?,
        None => None,
    };
    let deadline_text = match &selectors.deadline {
        Some(sel) => select_text(&doc, sel)?,
        None => None,
    };
    let amount_text = match &selectors.amount {
        Some(sel) => select_text(&doc, sel)?,
        None => None,
    };

    let mut confidence = BASE_CONFIDENCE;
    for found in [&sponsor, &description, &deadline_text, &amount_text] {
        if found.is_some() {
            confidence += FIELD_CONFIDENCE;
        }
    }

    let deadline = deadline_text
        .as_deref()
        .map(parse_deadline_text)
        .unwrap_or_default();

    let (min, max) = amount_text
        .as_deref()
        .map(parse_funding_text)
        .unwrap_or((None, None));

    Ok(ExtractedGrant {
        title,
        sponsor: sponsor
            .or_else(|| hints.default_sponsor.map(str::to_string))
            .unwrap_or_default(),
        description: description.unwrap_or_default(),
        apply_url,
        funding: FundingInfo {
            min,
            max,
            text: amount_text,
            funding_type: FundingType::Grant,
        },
        deadline,
        geography: GeographyInfo {
            states: Vec::new(),
            is_national: hints.default_national,
        },
        eligibility: EligibilityInfo::default(),
        categories: Vec::new(),
        source_status: None,
        extraction_confidence: confidence,
    })
}

/// Split a listing page into per-item HTML fragments using the item selector.
pub fn split_items(page_html: &str, item_selector: &str) -> Result<Vec<String>, IngestError> {
    let selector = parse_selector(item_selector)?;
    let doc = Html::parse_document(page_html);
    Ok(doc.select(&selector).map(|el| el.html()).collect())
}

/// Find the next-page link on a listing page, resolved against the page URL.
pub fn next_page_url(
    page_html: &str,
    next_selector: &str,
    page_url: &str,
) -> Result<Option<String>, IngestError> {
    let selector = parse_selector(next_selector)?;
    let doc = Html::parse_document(page_html);
    let href = doc
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);
    match href {
        Some(h) => Ok(Some(resolve_url(page_url, &h)?)),
        None => Ok(None),
    }
}

fn parse_selector(raw: &str) -> Result<Selector, IngestError> {
    Selector::parse(raw).map_err(|e| IngestError::Config(format!("bad selector {raw:?}: {e}")))
}

fn select_text(doc: &Html, raw: &str) -> Result<Option<String>, IngestError> {
    let selector = parse_selector(raw)?;
    Ok(doc.select(&selector).next().map(|el| {
        el.text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }))
}

fn select_href(doc: &Html, raw: &str) -> Result<Option<String>, IngestError> {
    let selector = parse_selector(raw)?;
    Ok(doc
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string))
}

fn resolve_url(base: &str, href: &str) -> Result<String, IngestError> {
    let base = Url::parse(base)
        .map_err(|e| IngestError::Extraction(format!("bad base URL {base:?}: {e}")))?;
    base.join(href)
        .map(|u| u.to_string())
        .map_err(|e| IngestError::Extraction(format!("bad link {href:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ScrapeSelectors;
    use grantwell_common::types::DeadlineType;

    fn selectors() -> ScrapeSelectors {
        ScrapeSelectors {
            item: "article.grant".into(),
            title: "h3 a".into(),
            link: "h3 a".into(),
            sponsor: Some(".agency".into()),
            description: Some(".summary".into()),
            deadline: Some(".deadline".into()),
            amount: Some(".amount".into()),
            next_page: Some("a.next".into()),
        }
    }

    const ITEM: &str = r#"
        <article class="grant">
          <h3><a href="/grants/water-42">Clean Water Innovation Fund</a></h3>
          <div class="agency">Water Board</div>
          <div class="summary">Supports watershed restoration projects statewide.</div>
          <div class="deadline">Deadline: October 1, 2026</div>
          <div class="amount">Awards range from $25,000 to $100,000</div>
        </article>"#;

    fn hints<'a>(selectors: &'a ScrapeSelectors) -> StrategyHints<'a> {
        StrategyHints {
            base_url: "https://www.grants.ca.gov/grants/",
            selectors: Some(selectors),
            default_sponsor: Some("State of California"),
            default_national: false,
        }
    }

    #[tokio::test]
    async fn extracts_all_fields_from_fragment() {
        let sel = selectors();
        let g = SelectorStrategy.extract(ITEM, &hints(&sel)).await.unwrap();
        assert_eq!(g.title, "Clean Water Innovation Fund");
        assert_eq!(g.sponsor, "Water Board");
        assert_eq!(g.apply_url, "https://www.grants.ca.gov/grants/water-42");
        assert_eq!(g.deadline.deadline_type, DeadlineType::Fixed);
        assert_eq!(g.funding.min, Some(25_000.0));
        assert_eq!(g.funding.max, Some(100_000.0));
        assert_eq!(g.extraction_confidence, 100);
    }

    #[tokio::test]
    async fn missing_optional_fields_lower_confidence_and_use_defaults() {
        let sel = selectors();
        let sparse = r#"<article class="grant"><h3><a href="/g/1">Sparse Grant</a></h3></article>"#;
        let g = SelectorStrategy
            .extract(sparse, &hints(&sel))
            .await
            .unwrap();
        assert_eq!(g.sponsor, "State of California");
        assert_eq!(g.extraction_confidence, 60);
        assert_eq!(g.deadline.deadline_type, DeadlineType::Unknown);
    }

    #[tokio::test]
    async fn missing_title_is_an_extraction_error() {
        let sel = selectors();
        let err = SelectorStrategy
            .extract("<article class=\"grant\"></article>", &hints(&sel))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));
    }

    #[test]
    fn split_items_yields_one_fragment_per_listing() {
        let page = format!("<html><body>{ITEM}{ITEM}</body></html>");
        let items = split_items(&page, "article.grant").unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].contains("Clean Water Innovation Fund"));
    }

    #[test]
    fn next_page_resolves_relative_href() {
        let page = r#"<html><body><a class="next" href="?page=2">Next</a></body></html>"#;
        let next = next_page_url(page, "a.next", "https://www.grants.ca.gov/grants/").unwrap();
        assert_eq!(
            next.as_deref(),
            Some("https://www.grants.ca.gov/grants/?page=2")
        );
    }

    #[test]
    fn absent_next_page_is_none() {
        let next =
            next_page_url("<html></html>", "a.next", "https://www.grants.ca.gov/").unwrap();
        assert!(next.is_none());
    }
}
