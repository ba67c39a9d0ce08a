//! Runner-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use verdict_core::domain::runner::Runner;
use verdict_core::dto::runner::{ConnectRunner, RunnerView};

impl OrchestratorClient {
    // =============================================================================
    // Runner Connection
    // =============================================================================

    /// Verify the orchestrator is reachable and accepts this client's API key
    pub async fn health(&self) -> Result<()> {
        let response = self.get("/runner/_health").send().await?;

        self.handle_empty_response(response).await
    }

    /// Whether the orchestrator considers `runner_id` connected and recently seen
    pub async fn runner_health(&self, runner_id: &str) -> Result<bool> {
        let response = self
            .get("/runner/_health")
            .query(&[("runnerId", runner_id)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Ok(false);
        }
        self.handle_empty_response(response).await.map(|_| true)
    }

    /// Connect a runner to the orchestrator
    ///
    /// Reconnecting with the same id replaces the runner's name and tags.
    ///
    /// # Example
    /// ```no_run
    /// # use verdict_client::OrchestratorClient;
    /// # use verdict_core::dto::runner::ConnectRunner;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080", "my-api-key");
    /// let runner = client.connect(ConnectRunner {
    ///     id: "runner-001".to_string(),
    ///     name: "build box".to_string(),
    ///     tags: ["linux".to_string()].into(),
    /// }).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(&self, req: ConnectRunner) -> Result<Runner> {
        let response = self.post("/runner/connect").json(&req).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Runner Query
    // =============================================================================

    /// List the tenant's runners
    pub async fn list_runners(&self) -> Result<Vec<RunnerView>> {
        let response = self.get("/runners").send().await?;

        self.handle_response(response).await
    }

    /// Get details for a specific runner
    pub async fn get_runner(&self, runner_id: &str) -> Result<RunnerView> {
        let response = self.get(&format!("/runners/{}", runner_id)).send().await?;

        self.handle_response(response).await
    }
}
