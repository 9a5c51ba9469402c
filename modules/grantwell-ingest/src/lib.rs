//! Grant ingestion pipeline: fetch, extract, validate, dedup, normalize,
//! persist. One source at a time, per-source failures isolated, every run
//! audited with append-only stats.

pub mod adapter;
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod jobs;
pub mod normalizer;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{adapter_for, RawPage, RawRecord, RawUnit, SourceAdapter};
pub use dedup::{DedupDecision, Deduplicator};
pub use fetcher::{Fetcher, RateLimiter};
pub use pipeline::{IngestionRunStats, Orchestrator, ProgressSink, RunOutcome, Stage};
pub use registry::{SourceConfig, SourceRegistry};
pub use store::{GrantStore, GrantSummary, MemoryStore, UpsertOutcome};
