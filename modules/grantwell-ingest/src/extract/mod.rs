//! Extraction: raw fetched units into `ExtractedGrant` candidates.
//!
//! Structured sources map fields directly (`api::map_json_record`). Unstructured
//! text goes through a pluggable `ExtractionStrategy`; whatever the strategy,
//! its output must pass `validate_schema` before being accepted: a schema
//! failure drops the record as a recoverable error, never a silent coercion.

pub mod api;
pub mod selector;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grantwell_common::types::ExtractedGrant;
use grantwell_common::IngestError;
use tracing::warn;

use crate::registry::ScrapeSelectors;

/// Untrusted source text is capped before any strategy sees it.
pub const MAX_EXTRACT_INPUT_BYTES: usize = 100_000;

/// Context handed to a strategy alongside the raw text.
pub struct StrategyHints<'a> {
    pub base_url: &'a str,
    pub selectors: Option<&'a ScrapeSelectors>,
    pub default_sponsor: Option<&'a str>,
    pub default_national: bool,
}

/// A pluggable extraction strategy for unstructured sources. Implementations
/// may be deterministic (CSS selectors) or model-assisted; the pipeline treats
/// them interchangeably because output is always schema-validated afterward.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    async fn extract(
        &self,
        raw_text: &str,
        hints: &StrategyHints<'_>,
    ) -> Result<ExtractedGrant, IngestError>;

    fn name(&self) -> &str;
}

/// Wraps any strategy with a timeout, a retry budget, and mandatory post-hoc
/// schema validation. A strategy failure produces no record, not a guessed one.
pub struct BoundedStrategy {
    inner: Arc<dyn ExtractionStrategy>,
    timeout: Duration,
    max_attempts: u32,
}

impl BoundedStrategy {
    pub fn new(inner: Arc<dyn ExtractionStrategy>, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            inner,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for BoundedStrategy {
    async fn extract(
        &self,
        raw_text: &str,
        hints: &StrategyHints<'_>,
    ) -> Result<ExtractedGrant, IngestError> {
        let sanitized = sanitize_source_text(raw_text);
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(self.timeout, self.inner.extract(&sanitized, hints)).await {
                Ok(Ok(candidate)) => {
                    return match validate_schema(&candidate) {
                        Ok(()) => Ok(candidate),
                        Err(problems) => Err(IngestError::SchemaValidation(problems.join("; "))),
                    };
                }
                Ok(Err(e)) => {
                    warn!(strategy = self.inner.name(), attempt, error = %e, "Extraction attempt failed");
                    last_err = Some(e);
                }
                Err(_) => {
                    warn!(strategy = self.inner.name(), attempt, "Extraction attempt timed out");
                    last_err = Some(IngestError::Extraction(format!(
                        "strategy {} timed out",
                        self.inner.name()
                    )));
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| IngestError::Extraction("strategy produced no output".into())))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Strip control characters and cap length. Source text is untrusted input.
pub fn sanitize_source_text(text: &str) -> String {
    let mut out: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    if out.len() > MAX_EXTRACT_INPUT_BYTES {
        let mut cut = MAX_EXTRACT_INPUT_BYTES;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out
}

/// Strict schema check on extraction output. Absent optional facts are fine;
/// present facts must be well-formed.
pub fn validate_schema(candidate: &ExtractedGrant) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if candidate.title.trim().is_empty() {
        problems.push("title is empty".to_string());
    }
    if candidate.sponsor.trim().is_empty() {
        problems.push("sponsor is empty".to_string());
    }
    match url::Url::parse(&candidate.apply_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => problems.push(format!("apply_url is not a valid URL: {}", candidate.apply_url)),
    }
    if candidate.extraction_confidence > 100 {
        problems.push(format!(
            "extraction_confidence {} out of range 0-100",
            candidate.extraction_confidence
        ));
    }
    if let (Some(min), Some(max)) = (candidate.funding.min, candidate.funding.max) {
        if min > max {
            problems.push(format!("funding min {min} exceeds max {max}"));
        }
    }
    if candidate.funding.min.is_some_and(|m| m < 0.0)
        || candidate.funding.max.is_some_and(|m| m < 0.0)
    {
        problems.push("funding amounts must be non-negative".to_string());
    }
    for state in &candidate.geography.states {
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            problems.push(format!("state {state:?} is not a 2-letter code"));
        }
    }
    if candidate.deadline.deadline_type == grantwell_common::types::DeadlineType::Fixed
        && candidate.deadline.date.is_none()
    {
        problems.push("fixed deadline without a date".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantwell_common::types::{DeadlineInfo, DeadlineType};

    fn candidate() -> ExtractedGrant {
        ExtractedGrant {
            title: "Test Grant".into(),
            sponsor: "Test Agency".into(),
            description: "A description long enough to be plausible for testing.".into(),
            apply_url: "https://example.gov/apply".into(),
            funding: Default::default(),
            deadline: Default::default(),
            geography: Default::default(),
            eligibility: Default::default(),
            categories: Vec::new(),
            source_status: None,
            extraction_confidence: 100,
        }
    }

    #[test]
    fn well_formed_candidate_passes() {
        assert!(validate_schema(&candidate()).is_ok());
    }

    #[test]
    fn empty_title_and_sponsor_are_schema_failures() {
        let mut c = candidate();
        c.title = "  ".into();
        c.sponsor = String::new();
        let problems = validate_schema(&c).unwrap_err();
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn bad_url_is_a_schema_failure() {
        let mut c = candidate();
        c.apply_url = "apply here".into();
        assert!(validate_schema(&c).is_err());
    }

    #[test]
    fn inverted_funding_bounds_fail() {
        let mut c = candidate();
        c.funding.min = Some(50_000.0);
        c.funding.max = Some(5_000.0);
        assert!(validate_schema(&c).is_err());
    }

    #[test]
    fn non_two_letter_state_fails() {
        let mut c = candidate();
        c.geography.states = vec!["California".into()];
        assert!(validate_schema(&c).is_err());
    }

    #[test]
    fn fixed_deadline_requires_date() {
        let mut c = candidate();
        c.deadline = DeadlineInfo {
            deadline_type: DeadlineType::Fixed,
            date: None,
            text: Some("June 1".into()),
        };
        assert!(validate_schema(&c).is_err());
    }

    #[test]
    fn sanitize_strips_control_chars_and_caps_length() {
        let dirty = "hello\u{0000}world\n\tok";
        assert_eq!(sanitize_source_text(dirty), "helloworld\n\tok");

        let long = "x".repeat(MAX_EXTRACT_INPUT_BYTES + 500);
        assert_eq!(sanitize_source_text(&long).len(), MAX_EXTRACT_INPUT_BYTES);
    }

    struct FailingStrategy;

    #[async_trait]
    impl ExtractionStrategy for FailingStrategy {
        async fn extract(
            &self,
            _raw_text: &str,
            _hints: &StrategyHints<'_>,
        ) -> Result<ExtractedGrant, IngestError> {
            Err(IngestError::Extraction("nope".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct MalformedStrategy;

    #[async_trait]
    impl ExtractionStrategy for MalformedStrategy {
        async fn extract(
            &self,
            _raw_text: &str,
            _hints: &StrategyHints<'_>,
        ) -> Result<ExtractedGrant, IngestError> {
            let mut c = candidate();
            c.title = String::new();
            Ok(c)
        }

        fn name(&self) -> &str {
            "malformed"
        }
    }

    fn hints() -> StrategyHints<'static> {
        StrategyHints {
            base_url: "https://example.gov",
            selectors: None,
            default_sponsor: None,
            default_national: false,
        }
    }

    #[tokio::test]
    async fn bounded_strategy_exhausts_retries_then_errors() {
        let bounded = BoundedStrategy::new(
            Arc::new(FailingStrategy),
            Duration::from_secs(1),
            2,
        );
        let err = bounded.extract("text", &hints()).await.unwrap_err();
        assert!(err.recoverable());
    }

    #[tokio::test]
    async fn bounded_strategy_rejects_schema_invalid_output() {
        let bounded = BoundedStrategy::new(
            Arc::new(MalformedStrategy),
            Duration::from_secs(1),
            1,
        );
        let err = bounded.extract("text", &hints()).await.unwrap_err();
        assert!(matches!(err, IngestError::SchemaValidation(_)));
    }
}
