//! Orchestrator configuration
//!
//! Every setting comes from the environment and falls back to a default
//! suited for local development.

use std::collections::HashMap;
use std::time::Duration;
use verdict_core::pattern::DEFAULT_ARTIFACT_PATTERNS;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,

    /// How long a long-poll waits when the runner does not ask for a duration
    pub long_poll_timeout: Duration,

    /// Upper bound for the `wait` a runner may request
    pub long_poll_max: Duration,

    /// A runner not seen for this long is reported unhealthy
    pub runner_stale_after: Duration,

    /// Artifact patterns used for jobs that do not declare their own
    pub default_artifact_patterns: Vec<String>,

    /// Largest accepted artifact upload, in bytes
    pub max_artifact_bytes: usize,

    /// API token to tenant id
    pub api_keys: HashMap<String, String>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - DATABASE_URL (optional; in-memory store when unset)
    /// - LONG_POLL_TIMEOUT_SECS (optional, default: 10)
    /// - LONG_POLL_MAX_SECS (optional, default: 60)
    /// - RUNNER_STALE_AFTER_SECS (optional, default: 60)
    /// - DEFAULT_ARTIFACT_PATTERNS (optional, comma separated)
    /// - MAX_ARTIFACT_BYTES (optional, default: 64 MiB)
    /// - API_KEYS (optional, `token=tenant,token=tenant`)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = std::env::var("ORCHESTRATOR_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let long_poll_timeout = env_secs("LONG_POLL_TIMEOUT_SECS", defaults.long_poll_timeout);
        let long_poll_max = env_secs("LONG_POLL_MAX_SECS", defaults.long_poll_max);
        let runner_stale_after =
            env_secs("RUNNER_STALE_AFTER_SECS", defaults.runner_stale_after);

        let default_artifact_patterns = std::env::var("DEFAULT_ARTIFACT_PATTERNS")
            .map(|s| split_list(&s))
            .unwrap_or(defaults.default_artifact_patterns);

        let max_artifact_bytes = std::env::var("MAX_ARTIFACT_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_artifact_bytes);

        let api_keys = match std::env::var("API_KEYS") {
            Ok(raw) => parse_api_keys(&raw)?,
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            bind_addr,
            database_url,
            long_poll_timeout,
            long_poll_max,
            runner_stale_after,
            default_artifact_patterns,
            max_artifact_bytes,
            api_keys,
        })
    }

    /// Adds an API key for a tenant
    pub fn with_api_key(mut self, token: impl Into<String>, tenant: impl Into<String>) -> Self {
        self.api_keys.insert(token.into(), tenant.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.long_poll_timeout.is_zero() {
            anyhow::bail!("long_poll_timeout must be greater than 0");
        }

        if self.long_poll_max < self.long_poll_timeout {
            anyhow::bail!("long_poll_max must not be shorter than long_poll_timeout");
        }

        if self.runner_stale_after.is_zero() {
            anyhow::bail!("runner_stale_after must be greater than 0");
        }

        if self.default_artifact_patterns.is_empty() {
            anyhow::bail!("default_artifact_patterns cannot be empty");
        }

        if self.max_artifact_bytes == 0 {
            anyhow::bail!("max_artifact_bytes must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            long_poll_timeout: Duration::from_secs(10),
            long_poll_max: Duration::from_secs(60),
            runner_stale_after: Duration::from_secs(60),
            default_artifact_patterns: DEFAULT_ARTIFACT_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_artifact_bytes: 64 * 1024 * 1024,
            api_keys: HashMap::new(),
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `token=tenant` pairs separated by commas.
pub fn parse_api_keys(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut keys = HashMap::new();
    for pair in split_list(raw) {
        let Some((token, tenant)) = pair.split_once('=') else {
            anyhow::bail!("API_KEYS entry '{}' must look like token=tenant", pair);
        };
        let (token, tenant) = (token.trim(), tenant.trim());
        if token.is_empty() || tenant.is_empty() {
            anyhow::bail!("API_KEYS entry '{}' has an empty token or tenant", pair);
        }
        keys.insert(token.to_string(), tenant.to_string());
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.long_poll_timeout, Duration::from_secs(10));
        assert_eq!(config.long_poll_max, Duration::from_secs(60));
        assert_eq!(config.default_artifact_patterns.len(), 3);
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.long_poll_max = Duration::from_secs(5);
        assert!(config.validate().is_err());

        config.long_poll_max = Duration::from_secs(60);
        config.default_artifact_patterns.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys("abc=acme, def = globex,").unwrap();
        assert_eq!(keys.get("abc").map(String::as_str), Some("acme"));
        assert_eq!(keys.get("def").map(String::as_str), Some("globex"));

        assert!(parse_api_keys("missing-separator").is_err());
        assert!(parse_api_keys("=acme").is_err());
    }
}
