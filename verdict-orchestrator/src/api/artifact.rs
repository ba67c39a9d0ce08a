//! Artifact API Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use uuid::Uuid;
use verdict_core::dto::artifact::IngestReport;

use crate::api::error::ApiResult;
use crate::auth::Caller;
use crate::service::artifact_service;
use crate::state::AppState;

/// POST /runner/{runner_id}/jobs/{guid}/artifacts
/// Upload a zip archive of a job's artifacts and import the results it holds
pub async fn upload_artifacts(
    State(state): State<AppState>,
    caller: Caller,
    Path((runner_id, guid)): Path<(String, Uuid)>,
    body: Bytes,
) -> ApiResult<Json<IngestReport>> {
    tracing::info!(
        "Artifact upload from runner {} for job {} ({} bytes)",
        runner_id,
        guid,
        body.len()
    );

    let report =
        artifact_service::upload_artifacts(&state, &caller.tenant_id, &runner_id, guid, body)
            .await?;
    Ok(Json(report))
}
