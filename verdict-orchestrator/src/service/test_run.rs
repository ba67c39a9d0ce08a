//! Test Run Service
//!
//! Business logic for the test runs that imported results are merged into.

use verdict_core::domain::test_run::{TestCaseRun, TestRun};
use verdict_core::dto::test_run::CreateTestRun;

use crate::repository::StoreError;
use crate::service::sequence::EntityType;
use crate::state::AppState;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum TestRunError {
    #[error("test run not found: {0}")]
    NotFound(i64),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TestRunError>;

/// Create a test run numbered within its project
pub async fn create_test_run(
    state: &AppState,
    tenant_id: &str,
    project_id: i64,
    req: CreateTestRun,
) -> Result<TestRun> {
    validate_create_request(project_id, &req)?;

    let test_runs = state.store.test_runs.clone();
    let number = state
        .sequences
        .next(tenant_id, project_id, EntityType::TestRun, move |tenant, project| async move {
            test_runs.max_number(&tenant, project).await
        })
        .await?;

    let run = state
        .store
        .test_runs
        .create(tenant_id, project_id, number, req.name.trim())
        .await?;

    tracing::info!("Test run created: {} (#{} in project {})", run.id, number, project_id);

    Ok(run)
}

/// Get a test run by ID
pub async fn get_test_run(state: &AppState, tenant_id: &str, id: i64) -> Result<TestRun> {
    state
        .store
        .test_runs
        .find_by_id(id)
        .await?
        .filter(|r| r.tenant_id == tenant_id)
        .ok_or(TestRunError::NotFound(id))
}

/// Case results recorded for a test run
pub async fn get_results(state: &AppState, tenant_id: &str, id: i64) -> Result<Vec<TestCaseRun>> {
    let run = get_test_run(state, tenant_id, id).await?;
    let results = state.store.test_runs.list_case_runs(run.id).await?;
    Ok(results)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_create_request(project_id: i64, req: &CreateTestRun) -> Result<()> {
    if project_id <= 0 {
        return Err(TestRunError::Validation(
            "Project ID must be positive".to_string(),
        ));
    }

    if req.name.trim().is_empty() {
        return Err(TestRunError::Validation(
            "Test run name cannot be empty".to_string(),
        ));
    }

    if req.name.len() > 255 {
        return Err(TestRunError::Validation(
            "Test run name is too long (max 255 characters)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;

    fn request(name: &str) -> CreateTestRun {
        CreateTestRun {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_validate_create_request() {
        assert!(validate_create_request(1, &request("nightly")).is_ok());
        assert!(validate_create_request(1, &request("  ")).is_err());
        assert!(validate_create_request(-1, &request("nightly")).is_err());
    }

    #[tokio::test]
    async fn test_runs_are_numbered_per_project() {
        let state = testing::state();
        let a = create_test_run(&state, "acme", 1, request("a")).await.unwrap();
        let b = create_test_run(&state, "acme", 1, request("b")).await.unwrap();
        let c = create_test_run(&state, "acme", 2, request("c")).await.unwrap();

        assert_eq!((a.number, b.number, c.number), (1, 2, 1));
        assert!(get_results(&state, "acme", a.id).await.unwrap().is_empty());
        assert!(matches!(
            get_results(&state, "globex", a.id).await,
            Err(TestRunError::NotFound(_))
        ));
    }
}
