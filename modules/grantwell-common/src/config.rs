use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Empty means run against the in-memory store.
    pub database_url: String,

    // Fetching
    pub fetch_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub max_retries: u32,

    // Dedup
    pub similarity_threshold: f64,

    // Eligibility
    pub allow_unknown_status: bool,
    pub require_apply_url: bool,

    // Link verification
    pub verify_batch_size: usize,
    pub verify_batch_delay_ms: u64,
    pub verify_stale_days: i64,
}

impl Config {
    /// Load configuration from environment variables. Every value has a
    /// default; only DATABASE_URL changes which store backs the pipeline.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", 30),
            probe_timeout_secs: env_or("PROBE_TIMEOUT_SECS", 10),
            max_retries: env_or("FETCH_MAX_RETRIES", 3),
            similarity_threshold: env_or("SIMILARITY_THRESHOLD", 0.85),
            allow_unknown_status: env_or("ALLOW_UNKNOWN_STATUS", true),
            require_apply_url: env_or("REQUIRE_APPLY_URL", false),
            verify_batch_size: env_or("VERIFY_BATCH_SIZE", 10),
            verify_batch_delay_ms: env_or("VERIFY_BATCH_DELAY_MS", 1000),
            verify_stale_days: env_or("VERIFY_STALE_DAYS", 7),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            fetch_timeout_secs: 30,
            probe_timeout_secs: 10,
            max_retries: 3,
            similarity_threshold: 0.85,
            allow_unknown_status: true,
            require_apply_url: false,
            verify_batch_size: 10,
            verify_batch_delay_ms: 1000,
            verify_stale_days: 7,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
