//! Job API Handlers
//!
//! HTTP endpoints for job dispatch and lifecycle.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;
use verdict_core::domain::job::Job;
use verdict_core::dto::job::{JobAssignment, JobStatusUpdate};

use crate::api::error::ApiResult;
use crate::auth::Caller;
use crate::service::job_service;
use crate::state::AppState;

// =============================================================================
// Runner-facing Endpoints
// =============================================================================

/// GET /runner/{runner_id}/jobs
/// Long-poll for the next job; 204 when none arrives in time
pub async fn poll_job(
    State(state): State<AppState>,
    caller: Caller,
    Path(runner_id): Path<String>,
    Query(params): Query<PollQuery>,
) -> ApiResult<Response> {
    let wait = params.wait.map(Duration::from_secs);

    let job = job_service::next_job(&state, &caller.tenant_id, &runner_id, wait).await?;

    Ok(match job {
        Some(job) => {
            tracing::info!("Job {} dispatched to runner {}", job.guid, runner_id);
            Json(JobAssignment::from(job)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /runner/{runner_id}/jobs/{guid}
/// Report a status change for a job
pub async fn update_job_status(
    State(state): State<AppState>,
    caller: Caller,
    Path((runner_id, guid)): Path<(String, Uuid)>,
    Json(update): Json<JobStatusUpdate>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Status update from runner {} for job {}", runner_id, guid);

    let job =
        job_service::update_status(&state, &caller.tenant_id, &runner_id, guid, update).await?;
    Ok(Json(job))
}

// =============================================================================
// Management Endpoints
// =============================================================================

/// POST /jobs/{guid}/cancel
/// Cancel a job that has not finished yet
pub async fn cancel_job(
    State(state): State<AppState>,
    caller: Caller,
    Path(guid): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Canceling job: {}", guid);

    let job = job_service::cancel_job(&state, &caller.tenant_id, guid).await?;
    Ok(Json(job))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    /// Seconds to wait for a job
    pub wait: Option<u64>,
}
