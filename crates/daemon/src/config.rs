// Daemon configuration, read once from POOLKEEPER_* environment variables

use anyhow::{anyhow, Context, Result};
use poolkeeper_core::application::worker::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_DRAIN_TIMEOUT, DEFAULT_EMPTY_QUEUE_DELAY,
};
use poolkeeper_core::domain::QueueConfig;
use poolkeeper_core::PoolConfig;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.poolkeeper/queue.db";
const DEFAULT_QUEUES: &str = "default";
const DEFAULT_ENV_ALLOWLIST: &str = "PATH,HOME,USER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub pool: PoolConfig,
    pub db_path: String,
    pub drain_timeout: Duration,
    pub env_allowlist: Vec<String>,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let concurrency = parse_var(&lookup, "POOLKEEPER_CONCURRENCY")?.unwrap_or(DEFAULT_CONCURRENCY);

        let queues = lookup("POOLKEEPER_QUEUES").unwrap_or_else(|| DEFAULT_QUEUES.to_string());
        let queues = QueueConfig::parse_list(&queues)
            .map_err(|e| anyhow!("POOLKEEPER_QUEUES: {}", e))?;

        let empty_queue_delay = parse_var::<u64, _>(&lookup, "POOLKEEPER_EMPTY_QUEUE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_EMPTY_QUEUE_DELAY);

        let pool = PoolConfig::from_weighted(concurrency, &queues)
            .map_err(|e| anyhow!("invalid pool configuration: {}", e))?
            .with_empty_queue_delay(empty_queue_delay);
        pool.validate()
            .map_err(|e| anyhow!("invalid pool configuration: {}", e))?;

        let db_path = match lookup("POOLKEEPER_DB_PATH") {
            Some(path) => shellexpand::tilde(&path).into_owned(),
            None => shellexpand::tilde(DEFAULT_DB_PATH).into_owned(),
        };

        let drain_timeout = parse_var::<u64, _>(&lookup, "POOLKEEPER_DRAIN_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        let env_allowlist = lookup("POOLKEEPER_ENV_ALLOWLIST")
            .unwrap_or_else(|| DEFAULT_ENV_ALLOWLIST.to_string())
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        let log_format = match lookup("POOLKEEPER_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            pool,
            db_path,
            drain_timeout,
            env_allowlist,
            log_format,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{} is not a valid number", key))
}
