//! Persistence behind a trait so the pipeline, jobs, and tests share one
//! surface. `MemoryStore` backs tests and dry runs; `PgStore` is production.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use grantwell_common::types::{GrantStatus, LinkStatus, NormalizedGrant};
use grantwell_common::IngestError;
use serde::{Deserialize, Serialize};

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// The slice of a stored grant the deduplicator compares against.
#[derive(Debug, Clone)]
pub struct GrantSummary {
    pub source_name: String,
    pub source_id: String,
    pub title: String,
    pub sponsor: String,
    pub description: String,
    pub deadline_date: Option<NaiveDate>,
    pub funding_min: Option<f64>,
    pub funding_max: Option<f64>,
    pub url: String,
    pub fingerprint: String,
}

impl GrantSummary {
    pub fn of(grant: &NormalizedGrant) -> Self {
        Self {
            source_name: grant.source_name.clone(),
            source_id: grant.source_id.clone(),
            title: grant.title.clone(),
            sponsor: grant.sponsor.clone(),
            description: grant.description.clone(),
            deadline_date: grant.deadline_date,
            funding_min: grant.funding_min,
            funding_max: grant.funding_max,
            url: grant.url.clone(),
            fingerprint: grant.hash_fingerprint.clone(),
        }
    }
}

/// Grant counts by lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub forecasted: u64,
    pub open: u64,
    pub closed: u64,
}

/// One completed ingestion run, persisted for the health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub source_name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub error: Option<String>,
}

/// Rolling per-source health counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceState {
    pub source_name: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Runs in a row that produced zero new or updated records.
    pub consecutive_empty_runs: u32,
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Insert or update by `(source_name, source_id)`. Updates preserve
    /// `first_seen_at`, and a closed grant never reopens.
    async fn upsert_by_key(&self, grant: &NormalizedGrant) -> Result<UpsertOutcome, IngestError>;

    async fn existing_keys(&self) -> Result<Vec<(String, String)>, IngestError>;
    async fn existing_fingerprints(&self) -> Result<Vec<String>, IngestError>;
    async fn summaries(&self) -> Result<Vec<GrantSummary>, IngestError>;
    async fn all(&self) -> Result<Vec<NormalizedGrant>, IngestError>;
    async fn count_by_status(&self) -> Result<StatusCounts, IngestError>;

    /// Keys of open grants whose fixed deadline is before `today`.
    async fn open_expired_candidates(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<(String, String)>, IngestError>;
    async fn mark_closed(&self, keys: &[(String, String)]) -> Result<u64, IngestError>;

    /// `(source_name, source_id, url)` of grants not verified since `cutoff`,
    /// oldest first.
    async fn stale_links(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(String, String, String)>, IngestError>;
    async fn update_link_status(
        &self,
        key: &(String, String),
        status: LinkStatus,
        verified_at: DateTime<Utc>,
    ) -> Result<(), IngestError>;

    /// Page-level short-circuit: has this exact content been processed for
    /// this source before?
    async fn content_already_processed(
        &self,
        source_name: &str,
        hash: &str,
    ) -> Result<bool, IngestError>;
    async fn record_content_hash(&self, source_name: &str, hash: &str)
        -> Result<(), IngestError>;

    async fn record_run(&self, run: &RunRecord) -> Result<(), IngestError>;
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, IngestError>;

    async fn source_state(&self, source_name: &str) -> Result<Option<SourceState>, IngestError>;
    async fn update_source_state(&self, state: &SourceState) -> Result<(), IngestError>;
}

/// Fold one run's outcome into the source's rolling health counters.
pub fn advance_source_state(
    previous: Option<SourceState>,
    source_name: &str,
    run: &RunRecord,
) -> SourceState {
    let mut state = previous.unwrap_or_else(|| SourceState {
        source_name: source_name.to_string(),
        ..Default::default()
    });
    state.last_run_at = Some(run.started_at);
    if run.error.is_some() {
        state.consecutive_failures += 1;
        state.last_error.clone_from(&run.error);
    } else {
        state.consecutive_failures = 0;
        state.last_error = None;
        if run.inserted + run.updated == 0 {
            state.consecutive_empty_runs += 1;
        } else {
            state.consecutive_empty_runs = 0;
        }
    }
    state
}
