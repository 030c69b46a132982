//! Tracker configuration: defaults, environment overrides and validation.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::kernel::attention::DEFAULT_VISIBILITY_THRESHOLD;
use crate::kernel::delivery::{
    PipelineConfig, DEFAULT_BATCH_INTERVAL_MS, DEFAULT_MAX_PENDING_RETRIES, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY_MS,
};

pub const ENV_COLLECTOR_URL: &str = "FEEDWATCH_COLLECTOR_URL";
pub const ENV_BATCH_INTERVAL_MS: &str = "FEEDWATCH_BATCH_INTERVAL_MS";
pub const ENV_MAX_RETRIES: &str = "FEEDWATCH_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "FEEDWATCH_RETRY_DELAY_MS";
pub const ENV_SEND_CRITICAL_IMMEDIATELY: &str = "FEEDWATCH_SEND_CRITICAL_IMMEDIATELY";
pub const ENV_VISIBILITY_THRESHOLD: &str = "FEEDWATCH_VISIBILITY_THRESHOLD";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "FEEDWATCH_REQUEST_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Collector endpoint. `None` disables remote delivery; local tracking continues.
    pub collector_url: Option<String>,
    pub batch_interval: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_pending_retries: usize,
    /// Clicks and traffic-light hovers skip the batch queue.
    pub send_critical_immediately: bool,
    pub visibility_threshold: f64,
    pub request_timeout: Duration,
    /// How long the driver waits for in-flight sends after the session ends.
    pub shutdown_grace: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            collector_url: None,
            batch_interval: Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_pending_retries: DEFAULT_MAX_PENDING_RETRIES,
            send_critical_immediately: true,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the known keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_COLLECTOR_URL).filter(|u| !u.trim().is_empty()) {
            config.collector_url = Some(url.trim().to_string());
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_BATCH_INTERVAL_MS)? {
            config.batch_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, ENV_MAX_RETRIES)? {
            config.max_retries = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_SEND_CRITICAL_IMMEDIATELY) {
            config.send_critical_immediately = parse_flag(ENV_SEND_CRITICAL_IMMEDIATELY, &raw)?;
        }
        if let Some(t) = parse_var::<f64, _>(&lookup, ENV_VISIBILITY_THRESHOLD)? {
            config.visibility_threshold = t;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_REQUEST_TIMEOUT_MS)? {
            config.request_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(self.visibility_threshold));
        }
        if self.batch_interval.is_zero() {
            return Err(ConfigError::ZeroBatchInterval);
        }
        Ok(())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            enabled: self.collector_url.is_some(),
            batch_interval: self.batch_interval,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            max_pending_retries: self.max_pending_retries,
        }
    }
}

/// Command-line values layered over the environment. Unset fields keep
/// whatever [`TrackerConfig::from_env`] produced.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub collector_url: Option<String>,
    pub batch_interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub visibility_threshold: Option<f64>,
    pub request_timeout_ms: Option<u64>,
    pub send_critical_immediately: Option<bool>,
}

impl ConfigOverrides {
    pub fn apply(self, mut config: TrackerConfig) -> Result<TrackerConfig, ConfigError> {
        if let Some(url) = self.collector_url.filter(|u| !u.trim().is_empty()) {
            config.collector_url = Some(url.trim().to_string());
        }
        if let Some(ms) = self.batch_interval_ms {
            config.batch_interval = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(t) = self.visibility_threshold {
            config.visibility_threshold = t;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(flag) = self.send_critical_immediately {
            config.send_critical_immediately = flag;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value: raw.to_string() }),
    }
}
