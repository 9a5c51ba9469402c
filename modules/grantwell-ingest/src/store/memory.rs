//! In-memory store for tests and `--dry-run` style invocations.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use grantwell_common::types::{DeadlineType, GrantStatus, LinkStatus, NormalizedGrant};
use grantwell_common::IngestError;

use super::{
    GrantStore, GrantSummary, RunRecord, SourceState, StatusCounts, UpsertOutcome,
};

#[derive(Default)]
struct Inner {
    grants: HashMap<(String, String), NormalizedGrant>,
    content_hashes: HashSet<(String, String)>,
    runs: Vec<RunRecord>,
    source_states: HashMap<String, SourceState>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, IngestError> {
        self.inner
            .lock()
            .map_err(|_| IngestError::Store("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn upsert_by_key(&self, grant: &NormalizedGrant) -> Result<UpsertOutcome, IngestError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.grants.get_mut(&grant.key()) {
            let first_seen_at = existing.first_seen_at;
            let was_closed = existing.status == GrantStatus::Closed;
            *existing = grant.clone();
            existing.first_seen_at = first_seen_at;
            if was_closed {
                existing.status = GrantStatus::Closed;
            }
            return Ok(UpsertOutcome::Updated);
        }
        inner.grants.insert(grant.key(), grant.clone());
        Ok(UpsertOutcome::Inserted)
    }

    async fn existing_keys(&self) -> Result<Vec<(String, String)>, IngestError> {
        Ok(self.lock()?.grants.keys().cloned().collect())
    }

    async fn existing_fingerprints(&self) -> Result<Vec<String>, IngestError> {
        Ok(self
            .lock()?
            .grants
            .values()
            .map(|g| g.hash_fingerprint.clone())
            .collect())
    }

    async fn summaries(&self) -> Result<Vec<GrantSummary>, IngestError> {
        Ok(self.lock()?.grants.values().map(GrantSummary::of).collect())
    }

    async fn all(&self) -> Result<Vec<NormalizedGrant>, IngestError> {
        Ok(self.lock()?.grants.values().cloned().collect())
    }

    async fn count_by_status(&self) -> Result<StatusCounts, IngestError> {
        let mut counts = StatusCounts::default();
        for grant in self.lock()?.grants.values() {
            match grant.status {
                GrantStatus::Forecasted => counts.forecasted += 1,
                GrantStatus::Open => counts.open += 1,
                GrantStatus::Closed => counts.closed += 1,
            }
        }
        Ok(counts)
    }

    async fn open_expired_candidates(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<(String, String)>, IngestError> {
        Ok(self
            .lock()?
            .grants
            .values()
            .filter(|g| {
                g.status == GrantStatus::Open
                    && g.deadline_type == DeadlineType::Fixed
                    && g.deadline_date.is_some_and(|d| d < today)
            })
            .map(|g| g.key())
            .collect())
    }

    async fn mark_closed(&self, keys: &[(String, String)]) -> Result<u64, IngestError> {
        let mut inner = self.lock()?;
        let mut closed = 0;
        for key in keys {
            if let Some(grant) = inner.grants.get_mut(key) {
                if grant.status != GrantStatus::Closed {
                    grant.status = GrantStatus::Closed;
                    grant.updated_at = Utc::now();
                    closed += 1;
                }
            }
        }
        Ok(closed)
    }

    async fn stale_links(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(String, String, String)>, IngestError> {
        let inner = self.lock()?;
        let mut stale: Vec<&NormalizedGrant> = inner
            .grants
            .values()
            .filter(|g| g.last_verified_at < cutoff)
            .collect();
        stale.sort_by_key(|g| g.last_verified_at);
        Ok(stale
            .into_iter()
            .take(limit)
            .map(|g| (g.source_name.clone(), g.source_id.clone(), g.url.clone()))
            .collect())
    }

    async fn update_link_status(
        &self,
        key: &(String, String),
        status: LinkStatus,
        verified_at: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        let mut inner = self.lock()?;
        if let Some(grant) = inner.grants.get_mut(key) {
            grant.link_status = status;
            grant.last_verified_at = verified_at;
        }
        Ok(())
    }

    async fn content_already_processed(
        &self,
        source_name: &str,
        hash: &str,
    ) -> Result<bool, IngestError> {
        Ok(self
            .lock()?
            .content_hashes
            .contains(&(source_name.to_string(), hash.to_string())))
    }

    async fn record_content_hash(
        &self,
        source_name: &str,
        hash: &str,
    ) -> Result<(), IngestError> {
        self.lock()?
            .content_hashes
            .insert((source_name.to_string(), hash.to_string()));
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), IngestError> {
        self.lock()?.runs.push(run.clone());
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, IngestError> {
        let inner = self.lock()?;
        let mut runs = inner.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn source_state(&self, source_name: &str) -> Result<Option<SourceState>, IngestError> {
        Ok(self.lock()?.source_states.get(source_name).cloned())
    }

    async fn update_source_state(&self, state: &SourceState) -> Result<(), IngestError> {
        self.lock()?
            .source_states
            .insert(state.source_name.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use grantwell_common::types::FundingType;

    fn grant(source_id: &str, status: GrantStatus) -> NormalizedGrant {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        NormalizedGrant {
            source_id: source_id.into(),
            source_name: "test_source".into(),
            title: format!("Grant {source_id}"),
            sponsor: "Agency".into(),
            description: "Desc".into(),
            url: format!("https://example.gov/{source_id}"),
            funding_min: None,
            funding_max: None,
            funding_text: None,
            funding_type: FundingType::Grant,
            deadline_type: DeadlineType::Fixed,
            deadline_date: NaiveDate::from_ymd_opt(2026, 5, 1),
            deadline_text: None,
            is_national: true,
            states_json: "[]".into(),
            entity_types_json: "[]".into(),
            industries_json: "[]".into(),
            restrictions_json: "[]".into(),
            requirements_json: "[]".into(),
            categories_json: "[]".into(),
            status,
            hash_fingerprint: format!("fp-{source_id}"),
            quality_score: 70,
            link_status: LinkStatus::Unknown,
            last_verified_at: now,
            first_seen_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_preserves_first_seen_and_closed_status() {
        let store = MemoryStore::new();
        let original = grant("a", GrantStatus::Open);
        assert_eq!(
            store.upsert_by_key(&original).await.unwrap(),
            UpsertOutcome::Inserted
        );
        store
            .mark_closed(&[("test_source".into(), "a".into())])
            .await
            .unwrap();

        let mut reobserved = grant("a", GrantStatus::Open);
        reobserved.first_seen_at = Utc::now();
        assert_eq!(
            store.upsert_by_key(&reobserved).await.unwrap(),
            UpsertOutcome::Updated
        );

        let stored = store.all().await.unwrap().pop().unwrap();
        assert_eq!(stored.first_seen_at, original.first_seen_at);
        assert_eq!(stored.status, GrantStatus::Closed);
    }

    #[tokio::test]
    async fn expired_candidates_only_cover_open_fixed_past() {
        let store = MemoryStore::new();
        store.upsert_by_key(&grant("past", GrantStatus::Open)).await.unwrap();
        let mut rolling = grant("rolling", GrantStatus::Open);
        rolling.deadline_type = DeadlineType::Rolling;
        rolling.deadline_date = None;
        store.upsert_by_key(&rolling).await.unwrap();
        let mut future = grant("future", GrantStatus::Open);
        future.deadline_date = NaiveDate::from_ymd_opt(2027, 1, 1);
        store.upsert_by_key(&future).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let keys = store.open_expired_candidates(today).await.unwrap();
        assert_eq!(keys, vec![("test_source".into(), "past".into())]);
    }

    #[tokio::test]
    async fn stale_links_are_oldest_first_and_limited() {
        let store = MemoryStore::new();
        for (id, day) in [("a", 10), ("b", 5), ("c", 20)] {
            let mut g = grant(id, GrantStatus::Open);
            g.last_verified_at = Utc.with_ymd_and_hms(2026, 5, day, 0, 0, 0).unwrap();
            store.upsert_by_key(&g).await.unwrap();
        }
        let cutoff = Utc.with_ymd_and_hms(2026, 5, 15, 0, 0, 0).unwrap();
        let stale = store.stale_links(cutoff, 1).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].1, "b");
    }

    #[tokio::test]
    async fn content_hashes_round_trip() {
        let store = MemoryStore::new();
        assert!(!store.content_already_processed("s", "h1").await.unwrap());
        store.record_content_hash("s", "h1").await.unwrap();
        assert!(store.content_already_processed("s", "h1").await.unwrap());
        assert!(!store.content_already_processed("other", "h1").await.unwrap());
    }
}
