//! Test run API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use verdict_core::domain::test_run::{TestCaseRun, TestRun};
use verdict_core::dto::test_run::CreateTestRun;

impl OrchestratorClient {
    /// Create a test run in a project
    pub async fn create_test_run(&self, project_id: i64, name: &str) -> Result<TestRun> {
        let response = self
            .post(&format!("/projects/{}/runs", project_id))
            .json(&CreateTestRun {
                name: name.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Case results recorded for a test run
    pub async fn get_results(&self, test_run_id: i64) -> Result<Vec<TestCaseRun>> {
        let response = self
            .get(&format!("/runs/{}/results", test_run_id))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
