//! The per-source ingestion pipeline and the multi-source orchestrator.
//!
//! Sources run one at a time and are isolated from each other: a source that
//! fails (even fatally) never stops the next one. Every run, successful or
//! not, is recorded in the run log and folded into the source's health state.

mod stats;

pub use stats::IngestionRunStats;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grantwell_common::fingerprint::fingerprint;
use grantwell_common::types::{ExtractedGrant, LinkStatus};
use grantwell_common::{Config, IngestError};
use tracing::{debug, info, warn};

use crate::adapter::{adapter_for, RawRecord, RawUnit, SourceAdapter};
use crate::dedup::{DedupDecision, Deduplicator};
use crate::extract::selector::SelectorStrategy;
use crate::extract::{validate_schema, BoundedStrategy, ExtractionStrategy, StrategyHints};
use crate::fetcher::{Fetcher, RateLimiter};
use crate::normalizer::normalize;
use crate::registry::{SourceConfig, SourceRegistry};
use crate::store::{advance_source_state, GrantStore, GrantSummary, UpsertOutcome};
use crate::validator::validate;

/// Where a source run currently is. Reported through the progress sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Fetching,
    Extracting,
    Validating,
    Normalizing,
    Persisting,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Pending => write!(f, "pending"),
            Stage::Fetching => write!(f, "fetching"),
            Stage::Extracting => write!(f, "extracting"),
            Stage::Validating => write!(f, "validating"),
            Stage::Normalizing => write!(f, "normalizing"),
            Stage::Persisting => write!(f, "persisting"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Observer for run progress. The CLI logs transitions; tests assert on them.
/// Record counts are unknown until fetch completes, so `on_progress` only
/// fires once every page is in hand.
pub trait ProgressSink: Send + Sync {
    fn on_stage(&self, source_id: &str, stage: Stage);

    fn on_progress(&self, _source_id: &str, _done: u64, _total: u64) {}
}

/// Default sink: progress is only visible through tracing.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_stage(&self, _source_id: &str, _stage: Stage) {}
}

/// Aggregate verdict over a multi-source run, mapped to process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every source succeeded.
    Success,
    /// Some sources failed, some succeeded.
    Partial,
    /// Every source failed.
    Failure,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Partial => 1,
            RunOutcome::Failure => 2,
        }
    }
}

/// Result of one source within a multi-source run.
pub struct SourceRunResult {
    pub source_id: String,
    pub result: Result<IngestionRunStats, IngestError>,
}

/// Fold per-source results into one verdict. A run that completed but dropped
/// records on recoverable errors still degrades the outcome to `Partial`.
pub fn outcome_of(results: &[SourceRunResult]) -> RunOutcome {
    let failed = results.iter().filter(|r| r.result.is_err()).count();
    let degraded = results
        .iter()
        .filter(|r| matches!(&r.result, Ok(stats) if stats.had_recoverable_errors()))
        .count();
    if !results.is_empty() && failed == results.len() {
        RunOutcome::Failure
    } else if failed > 0 || degraded > 0 {
        RunOutcome::Partial
    } else {
        RunOutcome::Success
    }
}

pub struct Orchestrator {
    fetcher: Fetcher,
    store: Arc<dyn GrantStore>,
    config: Config,
    progress: Arc<dyn ProgressSink>,
    strategy: Arc<BoundedStrategy>,
}

impl Orchestrator {
    pub fn new(config: Config, store: Arc<dyn GrantStore>) -> Result<Self, IngestError> {
        let fetcher = Fetcher::new(&config)?;
        let strategy = Arc::new(BoundedStrategy::new(
            Arc::new(SelectorStrategy),
            Duration::from_secs(config.fetch_timeout_secs),
            config.max_retries.max(1),
        ));
        Ok(Self {
            fetcher,
            store,
            config,
            progress: Arc::new(NoopProgress),
            strategy,
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Run every enabled source sequentially. Failures are isolated.
    pub async fn run_all(&self, registry: &SourceRegistry) -> (Vec<SourceRunResult>, RunOutcome) {
        let mut results = Vec::new();
        for source in registry.all_enabled() {
            let result = self.run_source(source).await;
            if let Err(e) = &result {
                warn!(source = %source.id, error = %e, "Source run failed");
            }
            results.push(SourceRunResult {
                source_id: source.id.clone(),
                result,
            });
        }

        let outcome = outcome_of(&results);
        (results, outcome)
    }

    /// Run one source end to end, recording the run and updating health state
    /// whether it succeeds or fails.
    pub async fn run_source(
        &self,
        source: &SourceConfig,
    ) -> Result<IngestionRunStats, IngestError> {
        let adapter = adapter_for(source);
        self.run_source_with_adapter(source, adapter.as_ref()).await
    }

    pub async fn run_source_with_adapter(
        &self,
        source: &SourceConfig,
        adapter: &dyn SourceAdapter,
    ) -> Result<IngestionRunStats, IngestError> {
        self.progress.on_stage(&source.id, Stage::Pending);
        let started = Utc::now();
        let mut stats = IngestionRunStats::new(&source.id, started);

        let result = self.ingest(source, adapter, &mut stats).await;
        let error = result.as_ref().err().map(|e| e.to_string());

        let run = stats.to_run_record(Utc::now(), error);
        self.store.record_run(&run).await?;
        let previous = self.store.source_state(&source.id).await?;
        self.store
            .update_source_state(&advance_source_state(previous, &source.id, &run))
            .await?;

        match result {
            Ok(()) => {
                self.progress.on_stage(&source.id, Stage::Done);
                info!(source = %source.id, "Run complete\n{stats}");
                Ok(stats)
            }
            Err(e) => {
                self.progress.on_stage(&source.id, Stage::Failed);
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        source: &SourceConfig,
        adapter: &dyn SourceAdapter,
        stats: &mut IngestionRunStats,
    ) -> Result<(), IngestError> {
        self.progress.on_stage(&source.id, Stage::Fetching);
        let limiter = RateLimiter::new(&source.rate);
        let pages = adapter.fetch(&self.fetcher, &limiter).await?;
        stats.pages_fetched = pages.len() as u64;

        self.progress.on_stage(&source.id, Stage::Extracting);
        let mut dedup =
            Deduplicator::load(self.store.as_ref(), self.config.similarity_threshold).await?;
        let today = Utc::now().date_naive();
        let total_records: u64 = pages.iter().map(|p| p.records.len() as u64).sum();
        let mut processed: u64 = 0;

        for page in pages {
            if self
                .store
                .content_already_processed(&source.id, &page.content_hash)
                .await?
            {
                debug!(source = %source.id, url = %page.url, "Page content unchanged, skipping");
                stats.pages_unchanged += 1;
                processed += page.records.len() as u64;
                self.progress.on_progress(&source.id, processed, total_records);
                continue;
            }

            for record in page.records {
                stats.records_fetched += 1;
                processed += 1;
                let (source_id, candidate) = match self.extract_record(source, record).await {
                    Ok(extracted) => {
                        stats.extracted += 1;
                        extracted
                    }
                    Err(e) if e.recoverable() => {
                        stats.extraction_failures += 1;
                        stats.record_error("extract", &e);
                        self.progress.on_progress(&source.id, processed, total_records);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                self.progress.on_stage(&source.id, Stage::Validating);
                let validation = validate(&candidate, LinkStatus::Unknown, today);
                if !validation.is_valid {
                    debug!(
                        source = %source.id,
                        title = %candidate.title,
                        score = validation.quality_score,
                        errors = ?validation.errors,
                        "Candidate rejected"
                    );
                    stats.rejected += 1;
                    self.progress.on_progress(&source.id, processed, total_records);
                    continue;
                }

                let print = fingerprint(
                    &candidate.title,
                    &candidate.sponsor,
                    candidate.deadline.date,
                    candidate.funding.min,
                    candidate.funding.max,
                );
                match dedup.decide(&source.id, &source_id, &candidate, &print) {
                    DedupDecision::Duplicate {
                        of_fingerprint,
                        similarity,
                    } => {
                        debug!(
                            source = %source.id,
                            title = %candidate.title,
                            of = %of_fingerprint,
                            similarity,
                            "Duplicate, not persisted"
                        );
                        stats.duplicates += 1;
                    }
                    DedupDecision::New | DedupDecision::Update => {
                        self.progress.on_stage(&source.id, Stage::Normalizing);
                        let grant = normalize(
                            &candidate,
                            &source.id,
                            &source_id,
                            &validation,
                            LinkStatus::Unknown,
                            Utc::now(),
                        );
                        self.progress.on_stage(&source.id, Stage::Persisting);
                        match self.store.upsert_by_key(&grant).await? {
                            UpsertOutcome::Inserted => stats.inserted += 1,
                            UpsertOutcome::Updated => stats.updated += 1,
                        }
                        dedup.note_persisted(GrantSummary::of(&grant));
                    }
                }
                self.progress.on_progress(&source.id, processed, total_records);
            }

            self.store
                .record_content_hash(&source.id, &page.content_hash)
                .await?;
        }

        Ok(())
    }

    async fn extract_record(
        &self,
        source: &SourceConfig,
        record: RawRecord,
    ) -> Result<(String, ExtractedGrant), IngestError> {
        match record.unit {
            RawUnit::Json(value) => {
                let map = source.api_map.as_ref().ok_or_else(|| {
                    IngestError::Config(format!("{}: API source has no field map", source.id))
                })?;
                let (id, candidate) = crate::extract::api::map_json_record(&value, map, source)?;
                if let Err(problems) = validate_schema(&candidate) {
                    return Err(IngestError::SchemaValidation(problems.join("; ")));
                }
                Ok((id, candidate))
            }
            RawUnit::Html(fragment) => {
                let hints = StrategyHints {
                    base_url: &source.endpoint,
                    selectors: source.selectors.as_ref(),
                    default_sponsor: source.default_sponsor.as_deref(),
                    default_national: source.default_national,
                };
                let candidate = self.strategy.extract(&fragment, &hints).await?;
                let id = candidate
                    .source_identity(record.source_id.as_deref())
                    .to_string();
                Ok((id, candidate))
            }
            RawUnit::Entry(candidate) => {
                if let Err(problems) = validate_schema(&candidate) {
                    return Err(IngestError::SchemaValidation(problems.join("; ")));
                }
                let id = candidate
                    .source_identity(record.source_id.as_deref())
                    .to_string();
                Ok((id, *candidate))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_run(source_id: &str, errors: Vec<String>) -> SourceRunResult {
        let mut stats = IngestionRunStats::new(source_id, Utc::now());
        stats.errors = errors;
        SourceRunResult {
            source_id: source_id.into(),
            result: Ok(stats),
        }
    }

    fn failed_run(source_id: &str) -> SourceRunResult {
        SourceRunResult {
            source_id: source_id.into(),
            result: Err(IngestError::SourceUnreachable("down".into())),
        }
    }

    #[test]
    fn clean_runs_map_to_exit_zero() {
        let results = vec![ok_run("a", vec![]), ok_run("b", vec![])];
        assert_eq!(outcome_of(&results), RunOutcome::Success);
        assert_eq!(outcome_of(&results).exit_code(), 0);
    }

    #[test]
    fn recoverable_errors_degrade_the_outcome_to_partial() {
        let results = vec![
            ok_run("a", vec![]),
            ok_run("b", vec!["extract: record has no id at /id".into()]),
        ];
        assert_eq!(outcome_of(&results), RunOutcome::Partial);
        assert_eq!(outcome_of(&results).exit_code(), 1);
    }

    #[test]
    fn mixed_failures_are_partial_and_total_failure_is_fatal() {
        let mixed = vec![ok_run("a", vec![]), failed_run("b")];
        assert_eq!(outcome_of(&mixed), RunOutcome::Partial);

        let all_down = vec![failed_run("a"), failed_run("b")];
        assert_eq!(outcome_of(&all_down), RunOutcome::Failure);
        assert_eq!(outcome_of(&all_down).exit_code(), 2);
    }
}
