//! Configuration loading and representation.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::client::PollPolicy;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime settings for an offload host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadConfig {
    pub bind_addr: SocketAddr,
    pub workers: usize,
    pub poll: PollPolicy,
    /// Worker sleep when the queue is empty.
    pub worker_idle: Duration,
    /// How long terminal jobs stay readable before purge.
    pub retention: Duration,
    /// Registry entries older than this are swept as abandoned.
    pub registry_ttl: Duration,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        let poll = PollPolicy::default();
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            workers: 4,
            poll,
            worker_idle: Duration::from_millis(100),
            retention: Duration::from_secs(3600),
            registry_ttl: poll.timeout,
        }
    }
}

impl OffloadConfig {
    /// Load from `OFFLOAD_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = parse(&lookup, "OFFLOAD_BIND_ADDR")?.unwrap_or(defaults.bind_addr);
        let workers = parse::<usize, _>(&lookup, "OFFLOAD_WORKERS")?.unwrap_or(defaults.workers);
        if workers == 0 {
            return Err(ConfigError::Invalid {
                var: "OFFLOAD_WORKERS",
                value: "0".to_string(),
            });
        }

        let poll = PollPolicy {
            interval: millis(&lookup, "OFFLOAD_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll.interval),
            timeout: secs(&lookup, "OFFLOAD_POLL_TIMEOUT_SECS")?.unwrap_or(defaults.poll.timeout),
        };

        Ok(Self {
            bind_addr,
            workers,
            poll,
            worker_idle: millis(&lookup, "OFFLOAD_WORKER_IDLE_MS")?
                .unwrap_or(defaults.worker_idle),
            retention: secs(&lookup, "OFFLOAD_RETENTION_SECS")?.unwrap_or(defaults.retention),
            registry_ttl: secs(&lookup, "OFFLOAD_REGISTRY_TTL_SECS")?.unwrap_or(poll.timeout),
        })
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn millis<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64, _>(lookup, var)?.map(Duration::from_millis))
}

fn secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64, _>(lookup, var)?.map(Duration::from_secs))
}
