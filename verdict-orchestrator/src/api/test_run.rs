//! Test Run API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use verdict_core::domain::test_run::{TestCaseRun, TestRun};
use verdict_core::dto::test_run::CreateTestRun;

use crate::api::error::ApiResult;
use crate::auth::Caller;
use crate::service::test_run_service;
use crate::state::AppState;

/// POST /projects/{project_id}/runs
pub async fn create_test_run(
    State(state): State<AppState>,
    caller: Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateTestRun>,
) -> ApiResult<Json<TestRun>> {
    tracing::info!("Creating test run in project {}: {}", project_id, req.name);

    let run = test_run_service::create_test_run(&state, &caller.tenant_id, project_id, req).await?;
    Ok(Json(run))
}

/// GET /runs/{id}/results
pub async fn get_results(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<TestCaseRun>>> {
    tracing::debug!("Getting results for test run: {}", id);

    let results = test_run_service::get_results(&state, &caller.tenant_id, id).await?;
    Ok(Json(results))
}
