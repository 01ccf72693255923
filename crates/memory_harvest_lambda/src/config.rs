//! Environment-driven configuration, read once per cold start.

use std::time::Duration;

use crate::error::ConfigError;
use crate::runtime::contract::DEFAULT_LOOKBACK_DAYS;
use crate::runtime::orchestration::ORCHESTRATION_TIMEOUT;

pub const DEFAULT_DATA_PREFIX: &str = "lambda_memory_utilization";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(150);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_WORKER_CONCURRENCY: usize = 10;
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratorConfig {
    pub queue_url: String,
    pub default_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    Firehose { stream: String },
    S3Parquet { bucket: String, prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub sink: SinkConfig,
    pub query_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub queue_url: String,
    pub concurrency: usize,
    pub visibility_timeout: Duration,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub enumerator_function: String,
    pub timeout: Duration,
    pub regions: Option<String>,
    pub days: Option<u32>,
}

impl EnumeratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_url: required(&lookup, "SQS_QUEUE_URL")?,
            default_days: positive(&lookup, "DEFAULT_LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
        })
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let sink = match optional(&lookup, "SINK_MODE").as_deref() {
            None | Some("firehose") => SinkConfig::Firehose {
                stream: required(&lookup, "FIREHOSE_STREAM")?,
            },
            Some("s3_parquet") => SinkConfig::S3Parquet {
                bucket: required(&lookup, "DATA_BUCKET")?,
                prefix: optional(&lookup, "DATA_PREFIX")
                    .unwrap_or_else(|| DEFAULT_DATA_PREFIX.to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SINK_MODE",
                    value: other.to_string(),
                    reason: "expected 'firehose' or 's3_parquet'".to_string(),
                });
            }
        };

        Ok(Self {
            sink,
            query_timeout: seconds(&lookup, "QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT)?,
            poll_interval: seconds(&lookup, "QUERY_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
        })
    }
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let visibility_timeout =
            seconds(&lookup, "VISIBILITY_TIMEOUT_SECS", DEFAULT_VISIBILITY_TIMEOUT)?;
        let worker = WorkerConfig::from_lookup(&lookup)?;
        // A message must stay hidden for as long as its query may run.
        if worker.query_timeout >= visibility_timeout {
            return Err(ConfigError::Invalid {
                key: "QUERY_TIMEOUT_SECS",
                value: worker.query_timeout.as_secs().to_string(),
                reason: format!(
                    "must be below VISIBILITY_TIMEOUT_SECS={}",
                    visibility_timeout.as_secs()
                ),
            });
        }

        Ok(Self {
            queue_url: required(&lookup, "SQS_QUEUE_URL")?,
            concurrency: positive(&lookup, "WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY)?,
            visibility_timeout,
            worker,
        })
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let days = match optional(&lookup, "ORCHESTRATION_DAYS") {
            Some(_) => Some(positive(&lookup, "ORCHESTRATION_DAYS", DEFAULT_LOOKBACK_DAYS)?),
            None => None,
        };

        Ok(Self {
            enumerator_function: required(&lookup, "ENUMERATOR_FUNCTION_NAME")?,
            timeout: seconds(&lookup, "ORCHESTRATION_TIMEOUT_SECS", ORCHESTRATION_TIMEOUT)?,
            regions: optional(&lookup, "ORCHESTRATION_REGIONS"),
            days,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = optional(lookup, key) else {
        return Ok(default);
    };
    let value = raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: "expected a positive integer".to_string(),
    })?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    positive(lookup, key, default.as_secs()).map(Duration::from_secs)
}
