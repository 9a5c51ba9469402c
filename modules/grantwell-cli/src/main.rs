use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grantwell_common::Config;
use grantwell_eligibility::{filter_eligible, EngineConfig, UserProfile};
use grantwell_ingest::fetcher::Fetcher;
use grantwell_ingest::jobs::{expire_grants, health_report, verify_links};
use grantwell_ingest::store::{GrantStore, MemoryStore, PgStore};
use grantwell_ingest::{Orchestrator, SourceRegistry};

#[derive(Parser)]
#[command(name = "grantwell", about = "Grant ingestion and eligibility toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run ingestion for one source or every enabled source.
    Ingest {
        /// Source ID from the registry.
        #[arg(long, conflicts_with = "all")]
        source: Option<String>,
        /// Run every enabled source.
        #[arg(long)]
        all: bool,
    },
    /// Close open grants whose fixed deadline has passed.
    Expire,
    /// Re-probe apply URLs that have not been verified recently.
    VerifyLinks {
        /// Probe at most this many URLs.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print corpus totals and per-source health.
    Health {
        #[arg(long)]
        json: bool,
    },
    /// Evaluate stored grants against an applicant profile.
    Check {
        /// Path to a profile JSON file.
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let store: Arc<dyn GrantStore> = if config.database_url.is_empty() {
        warn!("DATABASE_URL not set; using the in-memory store (nothing persists)");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(PgStore::connect(&config.database_url).await?)
    };

    match cli.command {
        Command::Ingest { source, all } => ingest(&config, store, source, all).await,
        Command::Expire => {
            let closed = expire_grants(store.as_ref(), Utc::now().date_naive()).await?;
            println!("Closed {closed} expired grants");
            Ok(())
        }
        Command::VerifyLinks { limit } => {
            let fetcher = Fetcher::new(&config)?;
            let stats = verify_links(store.as_ref(), &fetcher, &config, limit).await?;
            println!(
                "Probed {} links: {} active, {} broken, {} unknown",
                stats.probed, stats.active, stats.broken, stats.unknown
            );
            Ok(())
        }
        Command::Health { json } => {
            let registry = SourceRegistry::builtin();
            let report = health_report(store.as_ref(), &registry, Utc::now()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Ok(())
        }
        Command::Check { profile, json } => check(&config, store, &profile, json).await,
    }
}

async fn ingest(
    config: &Config,
    store: Arc<dyn GrantStore>,
    source: Option<String>,
    all: bool,
) -> Result<()> {
    let registry = SourceRegistry::builtin();
    let orchestrator = Orchestrator::new(config.clone(), store)?;

    if all {
        let (results, outcome) = orchestrator.run_all(&registry).await;
        for result in &results {
            match &result.result {
                Ok(stats) => print!("{stats}"),
                Err(e) => eprintln!("{}: failed: {e}", result.source_id),
            }
        }
        std::process::exit(outcome.exit_code());
    }

    let Some(id) = source else {
        bail!("pass --source <id> or --all");
    };
    let Some(source) = registry.get(&id) else {
        let known: Vec<&str> = registry.all().iter().map(|s| s.id.as_str()).collect();
        bail!("unknown source {id:?}; known sources: {}", known.join(", "));
    };

    match orchestrator.run_source(source).await {
        Ok(stats) => {
            print!("{stats}");
            if stats.had_recoverable_errors() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{id}: failed: {e}");
            std::process::exit(2);
        }
    }
}

async fn check(
    config: &Config,
    store: Arc<dyn GrantStore>,
    profile_path: &PathBuf,
    json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(profile_path)
        .with_context(|| format!("reading profile {}", profile_path.display()))?;
    let profile: UserProfile = serde_json::from_str(&raw).context("parsing profile JSON")?;

    let engine_config = EngineConfig {
        allow_unknown_status: config.allow_unknown_status,
        require_apply_url: config.require_apply_url,
    };
    let grants = store.all().await?;
    info!(total = grants.len(), "Evaluating stored grants");

    let partition = filter_eligible(&profile, &grants, &engine_config);
    if json {
        let eligible: Vec<_> = partition
            .eligible
            .iter()
            .map(|g| {
                serde_json::json!({
                    "source": g.source_name,
                    "id": g.source_id,
                    "title": g.title,
                    "sponsor": g.sponsor,
                    "url": g.url,
                    "deadline": g.deadline_date,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&eligible)?);
        return Ok(());
    }

    println!(
        "{} of {} stored grants match the profile",
        partition.eligible.len(),
        grants.len()
    );
    for grant in &partition.eligible {
        let deadline = grant
            .deadline_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| grant.deadline_type.to_string());
        println!("  {} | {} | due {}", grant.title, grant.sponsor, deadline);
    }
    if !partition.failures_by_filter.is_empty() {
        println!("Top exclusion reasons:");
        let mut failures: Vec<_> = partition.failures_by_filter.iter().collect();
        failures.sort_by_key(|(_, n)| std::cmp::Reverse(**n));
        for (filter, count) in failures.into_iter().take(3) {
            println!("  {filter}: {count}");
        }
    }
    Ok(())
}
