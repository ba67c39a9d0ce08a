//! Pipeline-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use verdict_core::domain::pipeline::Pipeline;
use verdict_core::dto::pipeline::{CreatePipeline, Page, PipelineFilter};

impl OrchestratorClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// Create a pipeline in a project and queue its jobs
    ///
    /// # Example
    /// ```no_run
    /// # use verdict_client::OrchestratorClient;
    /// # use verdict_core::dto::job::CreateJob;
    /// # use verdict_core::dto::pipeline::CreatePipeline;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080", "my-api-key");
    /// let pipeline = client.create_pipeline(1, CreatePipeline {
    ///     external_identifier: Some("gh-run-42".to_string()),
    ///     jobs: vec![CreateJob {
    ///         script: Some("cargo test".to_string()),
    ///         ..Default::default()
    ///     }],
    ///     ..Default::default()
    /// }).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_pipeline(&self, project_id: i64, req: CreatePipeline) -> Result<Pipeline> {
        let response = self
            .post(&format!("/projects/{}/pipelines", project_id))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a pipeline by ID
    pub async fn get_pipeline(&self, pipeline_id: i64) -> Result<Pipeline> {
        let response = self
            .get(&format!("/pipelines/{}", pipeline_id))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Search pipelines, newest first
    ///
    /// Unset filter fields match everything; `offset` and `count` page the
    /// result.
    pub async fn search_pipelines(
        &self,
        filter: &PipelineFilter,
        offset: Option<u64>,
        count: Option<u64>,
    ) -> Result<Page<Pipeline>> {
        let mut request = self.get("/pipelines").query(filter);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }
        if let Some(count) = count {
            request = request.query(&[("count", count)]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }
}
