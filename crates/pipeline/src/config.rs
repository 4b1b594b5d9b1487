use std::time::Duration;

use syncbridge_core::bulk::csv_import::{ImportLimits, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_ROWS};

/// Runtime knobs shared by the API server and the worker.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sync jobs executed concurrently by one runner (default: `4`).
    pub max_concurrent_jobs: usize,
    /// How long a handshaken connector stays cached (default: 300 s).
    pub connector_cache_ttl: Duration,
    /// Upload limits for bulk operations.
    pub import_limits: ImportLimits,
    /// Delay between queue polls when idle (default: 1000 ms).
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            connector_cache_ttl: Duration::from_secs(300),
            import_limits: ImportLimits::default(),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default    |
    /// |----------------------------|------------|
    /// | `MAX_CONCURRENT_JOBS`      | `4`        |
    /// | `CONNECTOR_CACHE_TTL_SECS` | `300`      |
    /// | `BULK_MAX_ROWS`            | `50000`    |
    /// | `BULK_MAX_FILE_BYTES`      | `10485760` |
    /// | `QUEUE_POLL_INTERVAL_MS`   | `1000`     |
    pub fn from_env() -> Self {
        let max_concurrent_jobs: usize = env_or("MAX_CONCURRENT_JOBS", 4);
        assert!(max_concurrent_jobs > 0, "MAX_CONCURRENT_JOBS must be positive");

        Self {
            max_concurrent_jobs,
            connector_cache_ttl: Duration::from_secs(env_or("CONNECTOR_CACHE_TTL_SECS", 300)),
            import_limits: ImportLimits {
                max_rows: env_or("BULK_MAX_ROWS", DEFAULT_MAX_ROWS),
                max_file_bytes: env_or("BULK_MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES),
            },
            poll_interval: Duration::from_millis(env_or("QUEUE_POLL_INTERVAL_MS", 1000)),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid number: {e}")),
        Err(_) => default,
    }
}
