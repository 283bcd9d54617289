//! Client configuration
//!
//! All tunables of the request layer are injectable here rather than
//! hardcoded: base URL, timeout, retry budget, cache duration and circuit
//! breaker thresholds. Values can also be loaded from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notify::ErrorKind;
use crate::{Error, Result};

/// Circuit breaker tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Whether circuit breaking is active at all
    pub enabled: bool,
    /// Number of accumulated failures that opens the circuit
    pub threshold: u32,
    /// Time to wait after the last failure before closing an open circuit
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Configuration for the HTTP client layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL, relative or absolute prefix for every request path
    pub base_url: String,
    /// Total time budget for a single attempt
    pub timeout: Duration,
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Base delay between retries; attempt N waits `retry_delay * N`
    pub retry_delay: Duration,
    /// How long a cached GET response stays fresh
    pub cache_ttl: Duration,
    /// Circuit breaker settings
    pub breaker: BreakerConfig,
    /// Error kinds that never produce a user-visible notification
    pub silent_kinds: Vec<ErrorKind>,
    /// Optional endpoint receiving error reports
    pub report_endpoint: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "/api/v1".to_string(),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(60),
            breaker: BreakerConfig::default(),
            silent_kinds: Vec::new(),
            report_endpoint: None,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with a custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base retry delay
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the cache freshness window
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Replace the circuit breaker settings
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Suppress notifications for the given error kinds
    pub fn with_silent_kinds(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.silent_kinds = kinds;
        self
    }

    /// Send error reports to a remote collector
    pub fn with_report_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.report_endpoint = Some(endpoint.into());
        self
    }

    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Recognized variables: `VANTAGE_API_BASE_URL`, `VANTAGE_TIMEOUT_SECS`,
    /// `VANTAGE_MAX_RETRIES`, `VANTAGE_RETRY_DELAY_MS`, `VANTAGE_CACHE_TTL_SECS`,
    /// `VANTAGE_BREAKER_THRESHOLD`, `VANTAGE_BREAKER_COOLDOWN_SECS`,
    /// `VANTAGE_REPORT_ENDPOINT`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("VANTAGE_API_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(secs) = parse_env_u64("VANTAGE_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_env_u64("VANTAGE_MAX_RETRIES")? {
            config.max_retries = retries as u32;
        }
        if let Some(ms) = parse_env_u64("VANTAGE_RETRY_DELAY_MS")? {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env_u64("VANTAGE_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse_env_u64("VANTAGE_BREAKER_THRESHOLD")? {
            config.breaker.threshold = threshold as u32;
        }
        if let Some(secs) = parse_env_u64("VANTAGE_BREAKER_COOLDOWN_SECS")? {
            config.breaker.cooldown = Duration::from_secs(secs);
        }
        if let Ok(endpoint) = std::env::var("VANTAGE_REPORT_ENDPOINT") {
            config.report_endpoint = Some(endpoint);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration {
                message: "base_url cannot be empty".to_string(),
                source: None,
            });
        }
        if self.timeout.is_zero() {
            return Err(Error::Configuration {
                message: "timeout cannot be zero".to_string(),
                source: None,
            });
        }
        if self.retry_delay.is_zero() && self.max_retries > 0 {
            return Err(Error::Configuration {
                message: "retry_delay cannot be zero when retries are enabled".to_string(),
                source: None,
            });
        }
        if self.cache_ttl.is_zero() {
            return Err(Error::Configuration {
                message: "cache_ttl cannot be zero".to_string(),
                source: None,
            });
        }
        if self.breaker.enabled && self.breaker.threshold == 0 {
            return Err(Error::Configuration {
                message: "breaker threshold cannot be zero".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

fn parse_env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::Configuration {
                message: format!("{} must be an integer, got {:?}", name, raw),
                source: Some(anyhow::anyhow!(e)),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(config.breaker.enabled);
        assert_eq!(config.breaker.threshold, 5);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chain() {
        let config = ClientConfig::new("https://dash.example.com/api/v1")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(1)
            .with_cache_ttl(Duration::from_secs(10))
            .with_report_endpoint("/errors/report");

        assert_eq!(config.base_url, "https://dash.example.com/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.report_endpoint.as_deref(), Some("/errors/report"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.base_url = String::new();
        assert!(config.validate().is_err());

        config.base_url = "/api/v1".to_string();
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config.timeout = Duration::from_secs(15);
        config.retry_delay = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config.retry_delay = Duration::from_secs(1);
        config.breaker.threshold = 0;
        assert!(config.validate().is_err());

        config.breaker.enabled = false;
        assert!(config.validate().is_ok());
    }
}
