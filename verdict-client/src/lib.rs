//! Verdict HTTP Client
//!
//! A type-safe HTTP client for the Verdict orchestrator API.
//!
//! Runners use it to connect, long-poll for jobs, report status and upload
//! artifacts; tooling uses it to create pipelines and read results.
//!
//! # Example
//!
//! ```no_run
//! use verdict_client::OrchestratorClient;
//! use verdict_core::dto::pipeline::CreatePipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080", "my-api-key");
//!
//!     let pipeline = client.create_pipeline(1, CreatePipeline::default()).await?;
//!
//!     println!("Created pipeline #{}", pipeline.number);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod pipelines;
mod runners;
mod test_runs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use verdict_core::dto::job::JobAssignment;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the Verdict orchestrator API
///
/// Endpoint methods are grouped by domain:
/// - Runner connection, health and queries
/// - Job dispatch, status reports, cancellation and artifact upload
/// - Pipeline creation and search
/// - Test runs and their results
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// API key sent as a bearer token
    api_key: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use verdict_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080", "my-api-key");
    /// ```
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    /// Keep any request timeout longer than the long-poll wait.
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response whose body is ignored
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OrchestratorClient::new("http://localhost:8080", "k");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/", "k");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_requests_carry_bearer_key() {
        let client = OrchestratorClient::new("http://localhost:8080", "secret");
        let request = client.get("/runners").build().unwrap();

        assert_eq!(request.url().as_str(), "http://localhost:8080/runners");
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer secret"
        );
    }
}
