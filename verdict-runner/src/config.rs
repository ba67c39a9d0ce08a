//! Runner configuration
//!
//! Defines all configurable parameters for the runner including
//! the orchestrator connection, long-poll tuning and job limits.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
///
/// All timeouts are configurable to allow tuning for different deployment
/// scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this runner instance
    pub runner_id: String,

    /// Display name reported when connecting
    pub runner_name: String,

    /// Tags matched against job selectors
    pub tags: BTreeSet<String>,

    /// Orchestrator base URL (e.g., "http://localhost:8080")
    pub server_url: String,

    /// API key identifying the runner's tenant
    pub api_key: String,

    /// Directory under which each job gets its own workspace
    pub workspace_dir: PathBuf,

    /// How long one long-poll request waits for a job
    pub poll_wait: Duration,

    /// Maximum time a job script can run before it is killed
    pub job_timeout: Duration,

    /// Max parallel jobs the runner can handle
    pub max_parallel_jobs: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(runner_id: String, server_url: String) -> Self {
        Self {
            runner_name: runner_id.clone(),
            runner_id,
            tags: BTreeSet::new(),
            server_url,
            api_key: String::new(),
            workspace_dir: std::env::temp_dir().join("verdict-runner"),
            poll_wait: Duration::from_secs(30),
            job_timeout: Duration::from_secs(3600),
            max_parallel_jobs: 2,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - RUNNER_ID (required)
    /// - SERVER_URL (required)
    /// - API_KEY (required)
    /// - RUNNER_NAME (optional, default: RUNNER_ID)
    /// - RUNNER_TAGS (optional, comma separated)
    /// - WORKSPACE_DIR (optional, default: <tmp>/verdict-runner)
    /// - POLL_WAIT_SECS (optional, default: 30)
    /// - JOB_TIMEOUT (optional, seconds, default: 3600)
    /// - MAX_PARALLEL_JOBS (optional, default: 2)
    pub fn from_env() -> anyhow::Result<Self> {
        let runner_id = std::env::var("RUNNER_ID")
            .map_err(|_| anyhow::anyhow!("RUNNER_ID environment variable not set"))?;

        let server_url = std::env::var("SERVER_URL")
            .map_err(|_| anyhow::anyhow!("SERVER_URL environment variable not set"))?;

        let api_key = std::env::var("API_KEY")
            .map_err(|_| anyhow::anyhow!("API_KEY environment variable not set"))?;

        let defaults = Self::new(runner_id, server_url);

        let runner_name = std::env::var("RUNNER_NAME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.runner_name);

        let tags = std::env::var("RUNNER_TAGS")
            .map(|s| parse_tags(&s))
            .unwrap_or_default();

        let workspace_dir = std::env::var("WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_dir);

        let poll_wait = std::env::var("POLL_WAIT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_wait);

        let job_timeout = std::env::var("JOB_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_timeout);

        let max_parallel_jobs = std::env::var("MAX_PARALLEL_JOBS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_parallel_jobs);

        Ok(Self {
            runner_id: defaults.runner_id,
            runner_name,
            tags,
            server_url: defaults.server_url,
            api_key,
            workspace_dir,
            poll_wait,
            job_timeout,
            max_parallel_jobs,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runner_id.is_empty() {
            anyhow::bail!("runner_id cannot be empty");
        }

        if self.api_key.is_empty() {
            anyhow::bail!("api_key cannot be empty");
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            anyhow::bail!("server_url must start with http:// or https://");
        }

        if self.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        Ok(())
    }
}

fn parse_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::new("runner-1".to_string(), "http://localhost:8080".to_string());
        config.api_key = "key".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = config();
        assert_eq!(config.runner_name, "runner-1");
        assert_eq!(config.poll_wait, Duration::from_secs(30));
        assert_eq!(config.max_parallel_jobs, 2);
        assert!(config.tags.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = config();

        config.api_key = String::new();
        assert!(config.validate().is_err());
        config.api_key = "key".to_string();

        config.server_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.server_url = "https://verdict.example.com".to_string();
        assert!(config.validate().is_ok());

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(" linux, gpu ,,linux");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("linux"));
        assert!(tags.contains("gpu"));
    }
}
