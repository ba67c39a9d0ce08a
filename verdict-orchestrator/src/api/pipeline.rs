//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use verdict_core::domain::pipeline::{Pipeline, PipelineStatus};
use verdict_core::dto::pipeline::{CreatePipeline, Page, PipelineFilter};

use crate::api::error::ApiResult;
use crate::auth::Caller;
use crate::service::pipeline_service;
use crate::state::AppState;

/// POST /projects/{project_id}/pipelines
/// Create a pipeline and queue its jobs
pub async fn create_pipeline(
    State(state): State<AppState>,
    caller: Caller,
    Path(project_id): Path<i64>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!(
        "Creating pipeline in project {} with {} jobs",
        project_id,
        req.jobs.len()
    );

    let pipeline =
        pipeline_service::create_pipeline(&state, &caller.tenant_id, project_id, req).await?;
    Ok(Json(pipeline))
}

/// GET /pipelines
/// Search pipelines, newest first
pub async fn search_pipelines(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Page<Pipeline>>> {
    tracing::debug!("Searching pipelines: {:?}", params);

    let filter = PipelineFilter {
        project_id: params.project_id,
        status: params.status,
        external_identifier: params.external_identifier,
        cicd_system: params.cicd_system,
    };

    let page = pipeline_service::search_pipelines(
        &state,
        &caller.tenant_id,
        &filter,
        params.offset,
        params.count,
    )
    .await?;

    Ok(Json(page))
}

/// GET /pipelines/{id}
/// Get pipeline by ID
pub async fn get_pipeline(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipeline_service::get_pipeline(&state, &caller.tenant_id, id).await?;
    Ok(Json(pipeline))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub project_id: Option<i64>,
    pub status: Option<PipelineStatus>,
    pub external_identifier: Option<String>,
    pub cicd_system: Option<String>,
    pub offset: Option<u64>,
    pub count: Option<u64>,
}
