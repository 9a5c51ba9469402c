//! Scheduled maintenance: deadline expiry, link verification, health report.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use grantwell_common::types::LinkStatus;
use grantwell_common::{Config, IngestError};
use serde::Serialize;
use tracing::{debug, info};

use crate::fetcher::Fetcher;
use crate::registry::SourceRegistry;
use crate::store::{GrantStore, StatusCounts};

/// Close open grants whose fixed deadline has passed. Returns how many were
/// closed. Rolling deadlines are never touched.
pub async fn expire_grants(store: &dyn GrantStore, today: NaiveDate) -> Result<u64, IngestError> {
    let keys = store.open_expired_candidates(today).await?;
    if keys.is_empty() {
        return Ok(0);
    }
    let closed = store.mark_closed(&keys).await?;
    info!(closed, "Closed grants past their deadline");
    Ok(closed)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkVerifyStats {
    pub probed: u64,
    pub active: u64,
    pub broken: u64,
    pub unknown: u64,
}

/// Re-probe apply URLs not verified recently, in bounded batches with a
/// delay between batches so target sites never see a burst.
pub async fn verify_links(
    store: &dyn GrantStore,
    fetcher: &Fetcher,
    config: &Config,
    limit: Option<usize>,
) -> Result<LinkVerifyStats, IngestError> {
    let cutoff = Utc::now() - Duration::days(config.verify_stale_days);
    let mut stats = LinkVerifyStats::default();

    loop {
        let remaining = match limit {
            Some(cap) => {
                let left = cap.saturating_sub(stats.probed as usize);
                if left == 0 {
                    break;
                }
                left.min(config.verify_batch_size)
            }
            None => config.verify_batch_size,
        };
        // Verified rows get a fresh timestamp, so each query returns the
        // next-oldest batch.
        let batch = store.stale_links(cutoff, remaining).await?;
        if batch.is_empty() {
            break;
        }

        // Probe the whole batch concurrently; the batch size is the bound.
        let probes: Vec<(String, String, String, LinkStatus)> = stream::iter(batch)
            .map(|(source_name, source_id, url)| async move {
                let status = fetcher.probe_url(&url).await;
                (source_name, source_id, url, status)
            })
            .buffer_unordered(config.verify_batch_size.max(1))
            .collect()
            .await;

        for (source_name, source_id, url, status) in probes {
            debug!(source = %source_name, url, %status, "Probed apply URL");
            stats.probed += 1;
            match status {
                LinkStatus::Active => stats.active += 1,
                LinkStatus::Broken => stats.broken += 1,
                LinkStatus::Unknown => stats.unknown += 1,
            }
            store
                .update_link_status(&(source_name, source_id), status, Utc::now())
                .await?;
        }

        tokio::time::sleep(std::time::Duration::from_millis(config.verify_batch_delay_ms)).await;
    }

    info!(
        probed = stats.probed,
        active = stats.active,
        broken = stats.broken,
        unknown = stats.unknown,
        "Link verification pass complete"
    );
    Ok(stats)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failed,
    NeverRun,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Failed => write!(f, "failed"),
            HealthStatus::NeverRun => write!(f, "never_run"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub status: HealthStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub consecutive_empty_runs: u32,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub totals: StatusCounts,
    /// Corpus-wide alerts, independent of any one source.
    pub alerts: Vec<String>,
    pub sources: Vec<SourceHealth>,
}

/// Failures in a row before a source counts as failed outright.
const FAILED_RUN_THRESHOLD: u32 = 3;
/// Empty (zero inserted or updated) runs in a row before flagging staleness.
const EMPTY_RUN_THRESHOLD: u32 = 3;
/// Fewer open grants than this corpus-wide raises an alert.
const OPEN_GRANTS_LOW_WATER: u64 = 10;

/// Assemble per-source health from the rolling counters and run recency.
pub async fn health_report(
    store: &dyn GrantStore,
    registry: &SourceRegistry,
    now: DateTime<Utc>,
) -> Result<HealthReport, IngestError> {
    let totals = store.count_by_status().await?;
    let mut sources = Vec::new();

    for source in registry.all_enabled() {
        let state = store.source_state(&source.id).await?;
        let Some(state) = state else {
            sources.push(SourceHealth {
                source_id: source.id.clone(),
                status: HealthStatus::NeverRun,
                last_run_at: None,
                consecutive_failures: 0,
                consecutive_empty_runs: 0,
                alerts: vec!["source has never run".to_string()],
            });
            continue;
        };

        let mut alerts = Vec::new();
        if state.consecutive_failures > 0 {
            let detail = state.last_error.as_deref().unwrap_or("unknown error");
            alerts.push(format!(
                "{} consecutive failures, last: {detail}",
                state.consecutive_failures
            ));
        }
        if state.consecutive_empty_runs >= EMPTY_RUN_THRESHOLD {
            alerts.push(format!(
                "{} runs in a row produced no new or updated records",
                state.consecutive_empty_runs
            ));
        }
        if let Some(last_run) = state.last_run_at {
            let overdue = Duration::hours(i64::from(source.schedule_hours) * 2);
            if now - last_run > overdue {
                alerts.push(format!(
                    "last run was {} hours ago, schedule is every {} hours",
                    (now - last_run).num_hours(),
                    source.schedule_hours
                ));
            }
        }

        let status = if state.consecutive_failures >= FAILED_RUN_THRESHOLD {
            HealthStatus::Failed
        } else if !alerts.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        sources.push(SourceHealth {
            source_id: source.id.clone(),
            status,
            last_run_at: state.last_run_at,
            consecutive_failures: state.consecutive_failures,
            consecutive_empty_runs: state.consecutive_empty_runs,
            alerts,
        });
    }

    let mut alerts = Vec::new();
    if totals.open == 0 {
        alerts.push("no open grants in the corpus".to_string());
    } else if totals.open < OPEN_GRANTS_LOW_WATER {
        alerts.push(format!(
            "only {} open grants in the corpus (low-water mark is {OPEN_GRANTS_LOW_WATER})",
            totals.open
        ));
    }

    Ok(HealthReport {
        generated_at: now,
        totals,
        alerts,
        sources,
    })
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Grants: {} open, {} forecasted, {} closed",
            self.totals.open, self.totals.forecasted, self.totals.closed
        )?;
        for alert in &self.alerts {
            writeln!(f, "! {alert}")?;
        }
        for source in &self.sources {
            writeln!(f, "[{}] {}", source.status, source.source_id)?;
            for alert in &source.alerts {
                writeln!(f, "    ! {alert}")?;
            }
        }
        Ok(())
    }
}
