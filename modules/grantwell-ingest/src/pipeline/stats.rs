//! Per-run counters, printed at the end of every source run and persisted
//! to the run log.

use chrono::{DateTime, Utc};

use crate::store::RunRecord;

#[derive(Debug, Clone)]
pub struct IngestionRunStats {
    pub source_name: String,
    pub started_at: DateTime<Utc>,
    pub pages_fetched: u64,
    pub pages_unchanged: u64,
    pub records_fetched: u64,
    pub extracted: u64,
    pub extraction_failures: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub inserted: u64,
    pub updated: u64,
    pub errors: Vec<String>,
}

impl IngestionRunStats {
    pub fn new(source_name: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            source_name: source_name.to_string(),
            started_at,
            pages_fetched: 0,
            pages_unchanged: 0,
            records_fetched: 0,
            extracted: 0,
            extraction_failures: 0,
            rejected: 0,
            duplicates: 0,
            inserted: 0,
            updated: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, context: &str, message: impl std::fmt::Display) {
        self.errors.push(format!("{context}: {message}"));
    }

    /// True when the run finished but some records were dropped on errors.
    pub fn had_recoverable_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn to_run_record(&self, finished_at: DateTime<Utc>, error: Option<String>) -> RunRecord {
        RunRecord {
            source_name: self.source_name.clone(),
            started_at: self.started_at,
            duration_ms: (finished_at - self.started_at).num_milliseconds().max(0) as u64,
            fetched: self.records_fetched,
            inserted: self.inserted,
            updated: self.updated,
            duplicates: self.duplicates,
            rejected: self.rejected,
            unchanged: self.pages_unchanged,
            failed: self.extraction_failures,
            error,
        }
    }
}

impl std::fmt::Display for IngestionRunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingestion run: {} ===", self.source_name)?;
        writeln!(
            f,
            "Pages: {} fetched, {} unchanged",
            self.pages_fetched, self.pages_unchanged
        )?;
        writeln!(
            f,
            "Records: {} fetched, {} extracted, {} extraction failures",
            self.records_fetched, self.extracted, self.extraction_failures
        )?;
        writeln!(
            f,
            "Verdicts: {} inserted, {} updated, {} duplicates, {} rejected",
            self.inserted, self.updated, self.duplicates, self.rejected
        )?;
        if !self.errors.is_empty() {
            writeln!(f, "Errors ({}):", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
        }
        Ok(())
    }
}
