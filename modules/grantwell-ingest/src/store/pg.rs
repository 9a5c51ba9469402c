//! Postgres store. Schema is created on connect; enums are stored as their
//! snake_case text form.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use grantwell_common::types::{
    DeadlineType, FundingType, GrantStatus, LinkStatus, NormalizedGrant,
};
use grantwell_common::IngestError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::{
    GrantStore, GrantSummary, RunRecord, SourceState, StatusCounts, UpsertOutcome,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS grants (
    source_name      TEXT NOT NULL,
    source_id        TEXT NOT NULL,
    title            TEXT NOT NULL,
    sponsor          TEXT NOT NULL,
    description      TEXT NOT NULL,
    url              TEXT NOT NULL,
    funding_min      DOUBLE PRECISION,
    funding_max      DOUBLE PRECISION,
    funding_text     TEXT,
    funding_type     TEXT NOT NULL,
    deadline_type    TEXT NOT NULL,
    deadline_date    DATE,
    deadline_text    TEXT,
    is_national      BOOLEAN NOT NULL,
    states_json      TEXT NOT NULL,
    entity_types_json TEXT NOT NULL,
    industries_json  TEXT NOT NULL,
    restrictions_json TEXT NOT NULL,
    requirements_json TEXT NOT NULL,
    categories_json  TEXT NOT NULL,
    status           TEXT NOT NULL,
    hash_fingerprint TEXT NOT NULL,
    quality_score    SMALLINT NOT NULL,
    link_status      TEXT NOT NULL,
    last_verified_at TIMESTAMPTZ NOT NULL,
    first_seen_at    TIMESTAMPTZ NOT NULL,
    updated_at       TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (source_name, source_id)
);
CREATE INDEX IF NOT EXISTS idx_grants_fingerprint ON grants (hash_fingerprint);
CREATE INDEX IF NOT EXISTS idx_grants_status ON grants (status);
CREATE INDEX IF NOT EXISTS idx_grants_last_verified ON grants (last_verified_at);

CREATE TABLE IF NOT EXISTS content_hashes (
    source_name  TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    seen_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (source_name, content_hash)
);

CREATE TABLE IF NOT EXISTS ingest_runs (
    id          BIGSERIAL PRIMARY KEY,
    source_name TEXT NOT NULL,
    started_at  TIMESTAMPTZ NOT NULL,
    duration_ms BIGINT NOT NULL,
    fetched     BIGINT NOT NULL,
    inserted    BIGINT NOT NULL,
    updated     BIGINT NOT NULL,
    duplicates  BIGINT NOT NULL,
    rejected    BIGINT NOT NULL,
    unchanged   BIGINT NOT NULL,
    failed      BIGINT NOT NULL,
    error       TEXT
);

CREATE TABLE IF NOT EXISTS source_states (
    source_name            TEXT PRIMARY KEY,
    last_run_at            TIMESTAMPTZ,
    last_error             TEXT,
    consecutive_failures   INTEGER NOT NULL,
    consecutive_empty_runs INTEGER NOT NULL
);
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and create the schema if it does not exist yet.
    pub async fn connect(database_url: &str) -> Result<Self, IngestError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| IngestError::Store(format!("connect failed: {e}")))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), IngestError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> IngestError {
    IngestError::Store(e.to_string())
}

fn funding_type_from(s: &str) -> FundingType {
    match s {
        "grant" => FundingType::Grant,
        "loan" => FundingType::Loan,
        "rebate" => FundingType::Rebate,
        "tax_credit" => FundingType::TaxCredit,
        "forgivable_loan" => FundingType::ForgivableLoan,
        _ => FundingType::Unknown,
    }
}

fn deadline_type_from(s: &str) -> DeadlineType {
    match s {
        "fixed" => DeadlineType::Fixed,
        "rolling" => DeadlineType::Rolling,
        _ => DeadlineType::Unknown,
    }
}

fn link_status_from(s: &str) -> LinkStatus {
    match s {
        "active" => LinkStatus::Active,
        "broken" => LinkStatus::Broken,
        _ => LinkStatus::Unknown,
    }
}

fn grant_from_row(row: &sqlx::postgres::PgRow) -> Result<NormalizedGrant, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let funding_type: String = row.try_get("funding_type")?;
    let deadline_type: String = row.try_get("deadline_type")?;
    let link_status: String = row.try_get("link_status")?;
    let quality: i16 = row.try_get("quality_score")?;
    Ok(NormalizedGrant {
        source_id: row.try_get("source_id")?,
        source_name: row.try_get("source_name")?,
        title: row.try_get("title")?,
        sponsor: row.try_get("sponsor")?,
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        funding_min: row.try_get("funding_min")?,
        funding_max: row.try_get("funding_max")?,
        funding_text: row.try_get("funding_text")?,
        funding_type: funding_type_from(&funding_type),
        deadline_type: deadline_type_from(&deadline_type),
        deadline_date: row.try_get("deadline_date")?,
        deadline_text: row.try_get("deadline_text")?,
        is_national: row.try_get("is_national")?,
        states_json: row.try_get("states_json")?,
        entity_types_json: row.try_get("entity_types_json")?,
        industries_json: row.try_get("industries_json")?,
        restrictions_json: row.try_get("restrictions_json")?,
        requirements_json: row.try_get("requirements_json")?,
        categories_json: row.try_get("categories_json")?,
        status: GrantStatus::from_str_loose(&status).unwrap_or(GrantStatus::Closed),
        hash_fingerprint: row.try_get("hash_fingerprint")?,
        quality_score: quality.clamp(0, 100) as u8,
        link_status: link_status_from(&link_status),
        last_verified_at: row.try_get("last_verified_at")?,
        first_seen_at: row.try_get("first_seen_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl GrantStore for PgStore {
    async fn upsert_by_key(&self, grant: &NormalizedGrant) -> Result<UpsertOutcome, IngestError> {
        let row = sqlx::query(
            r#"
            INSERT INTO grants (
                source_name, source_id, title, sponsor, description, url,
                funding_min, funding_max, funding_text, funding_type,
                deadline_type, deadline_date, deadline_text, is_national,
                states_json, entity_types_json, industries_json,
                restrictions_json, requirements_json, categories_json,
                status, hash_fingerprint, quality_score, link_status,
                last_verified_at, first_seen_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            ON CONFLICT (source_name, source_id) DO UPDATE SET
                title = EXCLUDED.title,
                sponsor = EXCLUDED.sponsor,
                description = EXCLUDED.description,
                url = EXCLUDED.url,
                funding_min = EXCLUDED.funding_min,
                funding_max = EXCLUDED.funding_max,
                funding_text = EXCLUDED.funding_text,
                funding_type = EXCLUDED.funding_type,
                deadline_type = EXCLUDED.deadline_type,
                deadline_date = EXCLUDED.deadline_date,
                deadline_text = EXCLUDED.deadline_text,
                is_national = EXCLUDED.is_national,
                states_json = EXCLUDED.states_json,
                entity_types_json = EXCLUDED.entity_types_json,
                industries_json = EXCLUDED.industries_json,
                restrictions_json = EXCLUDED.restrictions_json,
                requirements_json = EXCLUDED.requirements_json,
                categories_json = EXCLUDED.categories_json,
                status = CASE WHEN grants.status = 'closed'
                              THEN 'closed' ELSE EXCLUDED.status END,
                hash_fingerprint = EXCLUDED.hash_fingerprint,
                quality_score = EXCLUDED.quality_score,
                link_status = EXCLUDED.link_status,
                last_verified_at = EXCLUDED.last_verified_at,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&grant.source_name)
        .bind(&grant.source_id)
        .bind(&grant.title)
        .bind(&grant.sponsor)
        .bind(&grant.description)
        .bind(&grant.url)
        .bind(grant.funding_min)
        .bind(grant.funding_max)
        .bind(&grant.funding_text)
        .bind(grant.funding_type.to_string())
        .bind(grant.deadline_type.to_string())
        .bind(grant.deadline_date)
        .bind(&grant.deadline_text)
        .bind(grant.is_national)
        .bind(&grant.states_json)
        .bind(&grant.entity_types_json)
        .bind(&grant.industries_json)
        .bind(&grant.restrictions_json)
        .bind(&grant.requirements_json)
        .bind(&grant.categories_json)
        .bind(grant.status.to_string())
        .bind(&grant.hash_fingerprint)
        .bind(i16::from(grant.quality_score))
        .bind(grant.link_status.to_string())
        .bind(grant.last_verified_at)
        .bind(grant.first_seen_at)
        .bind(grant.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let inserted: bool = row.try_get("inserted").map_err(store_err)?;
        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn existing_keys(&self) -> Result<Vec<(String, String)>, IngestError> {
        let rows = sqlx::query("SELECT source_name, source_id FROM grants")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(|r| {
                Ok((
                    r.try_get("source_name").map_err(store_err)?,
                    r.try_get("source_id").map_err(store_err)?,
                ))
            })
            .collect()
    }

    async fn existing_fingerprints(&self) -> Result<Vec<String>, IngestError> {
        let rows = sqlx::query("SELECT DISTINCT hash_fingerprint FROM grants")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(|r| r.try_get("hash_fingerprint").map_err(store_err))
            .collect()
    }

    async fn summaries(&self) -> Result<Vec<GrantSummary>, IngestError> {
        let rows = sqlx::query(
            "SELECT source_name, source_id, title, sponsor, description, \
             deadline_date, funding_min, funding_max, url, hash_fingerprint FROM grants",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(|r| {
                Ok(GrantSummary {
                    source_name: r.try_get("source_name").map_err(store_err)?,
                    source_id: r.try_get("source_id").map_err(store_err)?,
                    title: r.try_get("title").map_err(store_err)?,
                    sponsor: r.try_get("sponsor").map_err(store_err)?,
                    description: r.try_get("description").map_err(store_err)?,
                    deadline_date: r.try_get("deadline_date").map_err(store_err)?,
                    funding_min: r.try_get("funding_min").map_err(store_err)?,
                    funding_max: r.try_get("funding_max").map_err(store_err)?,
                    url: r.try_get("url").map_err(store_err)?,
                    fingerprint: r.try_get("hash_fingerprint").map_err(store_err)?,
                })
            })
            .collect()
    }

    async fn all(&self) -> Result<Vec<NormalizedGrant>, IngestError> {
        let rows = sqlx::query("SELECT * FROM grants")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(|r| grant_from_row(r).map_err(store_err))
            .collect()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, IngestError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM grants GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(store_err)?;
            let n: i64 = row.try_get("n").map_err(store_err)?;
            match status.as_str() {
                "forecasted" => counts.forecasted = n as u64,
                "open" => counts.open = n as u64,
                "closed" => counts.closed = n as u64,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn open_expired_candidates(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<(String, String)>, IngestError> {
        let rows = sqlx::query(
            "SELECT source_name, source_id FROM grants \
             WHERE status = 'open' AND deadline_type = 'fixed' AND deadline_date < $1",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(|r| {
                Ok((
                    r.try_get("source_name").map_err(store_err)?,
                    r.try_get("source_id").map_err(store_err)?,
                ))
            })
            .collect()
    }

    async fn mark_closed(&self, keys: &[(String, String)]) -> Result<u64, IngestError> {
        let mut closed = 0;
        for (source_name, source_id) in keys {
            let result = sqlx::query(
                "UPDATE grants SET status = 'closed', updated_at = now() \
                 WHERE source_name = $1 AND source_id = $2 AND status <> 'closed'",
            )
            .bind(source_name)
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
            closed += result.rows_affected();
        }
        Ok(closed)
    }

    async fn stale_links(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<(String, String, String)>, IngestError> {
        let rows = sqlx::query(
            "SELECT source_name, source_id, url FROM grants \
             WHERE last_verified_at < $1 ORDER BY last_verified_at ASC LIMIT $2",
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(|r| {
                Ok((
                    r.try_get("source_name").map_err(store_err)?,
                    r.try_get("source_id").map_err(store_err)?,
                    r.try_get("url").map_err(store_err)?,
                ))
            })
            .collect()
    }

    async fn update_link_status(
        &self,
        key: &(String, String),
        status: LinkStatus,
        verified_at: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "UPDATE grants SET link_status = $3, last_verified_at = $4 \
             WHERE source_name = $1 AND source_id = $2",
        )
        .bind(&key.0)
        .bind(&key.1)
        .bind(status.to_string())
        .bind(verified_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn content_already_processed(
        &self,
        source_name: &str,
        hash: &str,
    ) -> Result<bool, IngestError> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM content_hashes WHERE source_name = $1 AND content_hash = $2",
        )
        .bind(source_name)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.is_some())
    }

    async fn record_content_hash(
        &self,
        source_name: &str,
        hash: &str,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO content_hashes (source_name, content_hash) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(source_name)
        .bind(hash)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO ingest_runs (source_name, started_at, duration_ms, fetched, \
             inserted, updated, duplicates, rejected, unchanged, failed, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&run.source_name)
        .bind(run.started_at)
        .bind(run.duration_ms as i64)
        .bind(run.fetched as i64)
        .bind(run.inserted as i64)
        .bind(run.updated as i64)
        .bind(run.duplicates as i64)
        .bind(run.rejected as i64)
        .bind(run.unchanged as i64)
        .bind(run.failed as i64)
        .bind(&run.error)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, IngestError> {
        let rows = sqlx::query(
            "SELECT source_name, started_at, duration_ms, fetched, inserted, updated, \
             duplicates, rejected, unchanged, failed, error \
             FROM ingest_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(|r| {
                let get_u64 = |name: &str| -> Result<u64, IngestError> {
                    let v: i64 = r.try_get(name).map_err(store_err)?;
                    Ok(v.max(0) as u64)
                };
                Ok(RunRecord {
                    source_name: r.try_get("source_name").map_err(store_err)?,
                    started_at: r.try_get("started_at").map_err(store_err)?,
                    duration_ms: get_u64("duration_ms")?,
                    fetched: get_u64("fetched")?,
                    inserted: get_u64("inserted")?,
                    updated: get_u64("updated")?,
                    duplicates: get_u64("duplicates")?,
                    rejected: get_u64("rejected")?,
                    unchanged: get_u64("unchanged")?,
                    failed: get_u64("failed")?,
                    error: r.try_get("error").map_err(store_err)?,
                })
            })
            .collect()
    }

    async fn source_state(&self, source_name: &str) -> Result<Option<SourceState>, IngestError> {
        let row = sqlx::query(
            "SELECT source_name, last_run_at, last_error, consecutive_failures, \
             consecutive_empty_runs FROM source_states WHERE source_name = $1",
        )
        .bind(source_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(|r| {
            let failures: i32 = r.try_get("consecutive_failures").map_err(store_err)?;
            let empty: i32 = r.try_get("consecutive_empty_runs").map_err(store_err)?;
            Ok(SourceState {
                source_name: r.try_get("source_name").map_err(store_err)?,
                last_run_at: r.try_get("last_run_at").map_err(store_err)?,
                last_error: r.try_get("last_error").map_err(store_err)?,
                consecutive_failures: failures.max(0) as u32,
                consecutive_empty_runs: empty.max(0) as u32,
            })
        })
        .transpose()
    }

    async fn update_source_state(&self, state: &SourceState) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO source_states (source_name, last_run_at, last_error, \
             consecutive_failures, consecutive_empty_runs) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (source_name) DO UPDATE SET \
                last_run_at = EXCLUDED.last_run_at, \
                last_error = EXCLUDED.last_error, \
                consecutive_failures = EXCLUDED.consecutive_failures, \
                consecutive_empty_runs = EXCLUDED.consecutive_empty_runs",
        )
        .bind(&state.source_name)
        .bind(state.last_run_at)
        .bind(&state.last_error)
        .bind(state.consecutive_failures as i32)
        .bind(state.consecutive_empty_runs as i32)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
