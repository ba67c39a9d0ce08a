//! Job-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use reqwest::StatusCode;
use std::time::Duration;
use uuid::Uuid;
use verdict_core::domain::job::Job;
use verdict_core::dto::artifact::IngestReport;
use verdict_core::dto::job::{JobAssignment, JobStatusUpdate};

impl OrchestratorClient {
    // =============================================================================
    // Job Execution (Runner-specific)
    // =============================================================================

    /// Long-poll for the next job this runner may execute
    ///
    /// Returns `None` when the server answers 204 because no job arrived
    /// within `wait` (or the server's default wait).
    pub async fn poll_job(
        &self,
        runner_id: &str,
        wait: Option<Duration>,
    ) -> Result<Option<JobAssignment>> {
        let mut request = self.get(&format!("/runner/{}/jobs", runner_id));
        if let Some(wait) = wait {
            request = request.query(&[("wait", wait.as_secs())]);
        }
        let response = request.send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Report a status change for a job assigned to this runner
    pub async fn update_job_status(
        &self,
        runner_id: &str,
        job_guid: Uuid,
        update: &JobStatusUpdate,
    ) -> Result<Job> {
        let response = self
            .post(&format!("/runner/{}/jobs/{}", runner_id, job_guid))
            .json(update)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Upload a zip archive of the job's artifacts
    ///
    /// # Returns
    /// The per-entry ingestion report
    pub async fn upload_artifacts(
        &self,
        runner_id: &str,
        job_guid: Uuid,
        archive: Vec<u8>,
    ) -> Result<IngestReport> {
        let response = self
            .post(&format!("/runner/{}/jobs/{}/artifacts", runner_id, job_guid))
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .body(archive)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Job Management
    // =============================================================================

    /// Cancel a job that has not finished yet
    pub async fn cancel_job(&self, job_guid: Uuid) -> Result<Job> {
        let response = self
            .post(&format!("/jobs/{}/cancel", job_guid))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
