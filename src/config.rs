//! Pipeline configuration from environment variables

use crate::broker::OffsetReset;
use crate::consumer_core::error_handler::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration shared by the producer, consumer and dashboard binaries
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// SQLite file backing the message log
    pub broker_path: PathBuf,

    /// SQLite file holding the `trades` table
    pub db_path: PathBuf,

    pub topic: String,
    pub group_id: String,
    pub offset_reset: OffsetReset,

    /// Producer cadence
    pub emit_interval: Duration,

    /// Bound on messages queued for delivery but not yet confirmed
    pub max_in_flight: usize,

    pub poll_timeout: Duration,
    pub write_retry: RetryPolicy,
    pub stats_log_interval: Duration,

    /// Aggregator cadence
    pub refresh_interval: Duration,

    /// Number of most recent rows each refresh cycle reads
    pub window_size: usize,

    /// Where the headless dashboard writes its JSON view
    pub snapshot_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            broker_path: PathBuf::from("data/broker.db"),
            db_path: PathBuf::from("data/tradeflow.db"),
            topic: "orders".to_string(),
            group_id: "trades-consumer-group-v2".to_string(),
            offset_reset: OffsetReset::Latest,
            emit_interval: Duration::from_millis(1_000),
            max_in_flight: 1_000,
            poll_timeout: Duration::from_millis(1_000),
            write_retry: RetryPolicy::default(),
            stats_log_interval: Duration::from_secs(10),
            refresh_interval: Duration::from_millis(2_000),
            window_size: 200,
            snapshot_path: PathBuf::from("data/snapshot.json"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TRADEFLOW_BROKER_PATH` (default: data/broker.db)
    /// - `TRADEFLOW_DB_PATH` (default: data/tradeflow.db)
    /// - `TRADEFLOW_TOPIC` (default: orders)
    /// - `TRADEFLOW_GROUP_ID` (default: trades-consumer-group-v2)
    /// - `TRADEFLOW_OFFSET_RESET` (default: latest)
    /// - `EMIT_INTERVAL_MS` (default: 1000)
    /// - `MAX_IN_FLIGHT` (default: 1000)
    /// - `POLL_TIMEOUT_MS` (default: 1000)
    /// - `WRITE_RETRY_INITIAL_MS` (default: 500)
    /// - `WRITE_RETRY_MAX_MS` (default: 30000)
    /// - `WRITE_RETRY_LIMIT` (default: unset, retry forever)
    /// - `STATS_LOG_INTERVAL_SECS` (default: 10)
    /// - `REFRESH_INTERVAL_MS` (default: 2000)
    /// - `WINDOW_SIZE` (default: 200)
    /// - `SNAPSHOT_PATH` (default: data/snapshot.json)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let offset_reset = match lookup("TRADEFLOW_OFFSET_RESET") {
            Some(raw) => OffsetReset::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: "TRADEFLOW_OFFSET_RESET",
                value: raw.clone(),
                reason: "expected latest or earliest".to_string(),
            })?,
            None => defaults.offset_reset,
        };

        let write_retry = RetryPolicy {
            initial_delay: Duration::from_millis(parse_positive(
                &lookup,
                "WRITE_RETRY_INITIAL_MS",
                defaults.write_retry.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_positive(
                &lookup,
                "WRITE_RETRY_MAX_MS",
                defaults.write_retry.max_delay.as_millis() as u64,
            )?),
            // 0 or unset keeps the retry-forever behaviour
            max_retries: match parse_optional::<u32, _>(&lookup, "WRITE_RETRY_LIMIT")? {
                Some(0) | None => None,
                Some(limit) => Some(limit),
            },
        };

        if write_retry.max_delay < write_retry.initial_delay {
            return Err(ConfigError::InvalidValue {
                name: "WRITE_RETRY_MAX_MS",
                value: write_retry.max_delay.as_millis().to_string(),
                reason: "must not be smaller than WRITE_RETRY_INITIAL_MS".to_string(),
            });
        }

        Ok(Self {
            broker_path: lookup("TRADEFLOW_BROKER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.broker_path),
            db_path: lookup("TRADEFLOW_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            topic: non_empty(&lookup, "TRADEFLOW_TOPIC")?.unwrap_or(defaults.topic),
            group_id: non_empty(&lookup, "TRADEFLOW_GROUP_ID")?.unwrap_or(defaults.group_id),
            offset_reset,
            emit_interval: Duration::from_millis(parse_positive(
                &lookup,
                "EMIT_INTERVAL_MS",
                defaults.emit_interval.as_millis() as u64,
            )?),
            max_in_flight: parse_positive(&lookup, "MAX_IN_FLIGHT", defaults.max_in_flight as u64)?
                as usize,
            poll_timeout: Duration::from_millis(parse_positive(
                &lookup,
                "POLL_TIMEOUT_MS",
                defaults.poll_timeout.as_millis() as u64,
            )?),
            write_retry,
            stats_log_interval: Duration::from_secs(parse_positive(
                &lookup,
                "STATS_LOG_INTERVAL_SECS",
                defaults.stats_log_interval.as_secs(),
            )?),
            refresh_interval: Duration::from_millis(parse_positive(
                &lookup,
                "REFRESH_INTERVAL_MS",
                defaults.refresh_interval.as_millis() as u64,
            )?),
            window_size: parse_positive(&lookup, "WINDOW_SIZE", defaults.window_size as u64)?
                as usize,
            snapshot_path: lookup("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
        })
    }

    pub fn log_summary(&self) {
        log::info!("📊 Configuration:");
        log::info!("   ├─ Broker log: {}", self.broker_path.display());
        log::info!("   ├─ Trade store: {}", self.db_path.display());
        log::info!("   ├─ Topic: {} (group: {})", self.topic, self.group_id);
        log::info!("   ├─ Offset reset: {}", self.offset_reset.as_str());
        log::info!("   ├─ Emit interval: {}ms", self.emit_interval.as_millis());
        log::info!("   ├─ Refresh interval: {}ms (window: {} rows)", self.refresh_interval.as_millis(), self.window_size);
        match self.write_retry.max_retries {
            Some(limit) => log::info!("   └─ Write retries: up to {}", limit),
            None => log::info!("   └─ Write retries: unbounded"),
        }
    }
}

fn non_empty<F>(lookup: &F, name: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue {
            name,
            value,
            reason: "must not be empty".to_string(),
        }),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

fn parse_optional<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_optional::<u64, _>(lookup, name)? {
        Some(0) => Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.topic, "orders");
        assert_eq!(config.group_id, "trades-consumer-group-v2");
        assert_eq!(config.offset_reset, OffsetReset::Latest);
        assert_eq!(config.emit_interval, Duration::from_secs(1));
        assert_eq!(config.refresh_interval, Duration::from_secs(2));
        assert_eq!(config.window_size, 200);
        assert_eq!(config.write_retry.max_retries, None);
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("TRADEFLOW_TOPIC", "trades"),
            ("TRADEFLOW_OFFSET_RESET", "earliest"),
            ("WINDOW_SIZE", "50"),
            ("REFRESH_INTERVAL_MS", "250"),
            ("WRITE_RETRY_LIMIT", "5"),
            ("TRADEFLOW_DB_PATH", "/tmp/trades.db"),
        ])
        .unwrap();

        assert_eq!(config.topic, "trades");
        assert_eq!(config.offset_reset, OffsetReset::Earliest);
        assert_eq!(config.window_size, 50);
        assert_eq!(config.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.write_retry.max_retries, Some(5));
        assert_eq!(config.db_path, PathBuf::from("/tmp/trades.db"));
    }

    #[test]
    fn test_zero_retry_limit_means_unbounded() {
        let config = config_from(&[("WRITE_RETRY_LIMIT", "0")]).unwrap();
        assert_eq!(config.write_retry.max_retries, None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(config_from(&[("WINDOW_SIZE", "0")]).is_err());
        assert!(config_from(&[("EMIT_INTERVAL_MS", "soon")]).is_err());
        assert!(config_from(&[("TRADEFLOW_OFFSET_RESET", "middle")]).is_err());
        assert!(config_from(&[("TRADEFLOW_GROUP_ID", "  ")]).is_err());
        assert!(config_from(&[("WRITE_RETRY_INITIAL_MS", "5000"), ("WRITE_RETRY_MAX_MS", "100")]).is_err());
    }
}
