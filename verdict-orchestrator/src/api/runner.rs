//! Runner API Handlers
//!
//! HTTP endpoints for runner connection and runner queries.

use axum::{
    Json,
    extract::{Path, State},
};
use verdict_core::domain::runner::Runner;
use verdict_core::dto::runner::{ConnectRunner, RunnerView};

use crate::api::error::ApiResult;
use crate::auth::Caller;
use crate::service::runner_service;
use crate::state::AppState;

// =============================================================================
// Runner Connection
// =============================================================================

/// POST /runner/connect
/// Connect (or reconnect) a runner under the caller's tenant
pub async fn connect_runner(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<ConnectRunner>,
) -> ApiResult<Json<Runner>> {
    tracing::info!("Connecting runner: {}", req.id);

    let runner = runner_service::connect(&state, &caller.tenant_id, req).await?;
    Ok(Json(runner))
}

// =============================================================================
// Runner Query Endpoints
// =============================================================================

/// GET /runners
/// List the tenant's runners with their health
pub async fn list_runners(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<RunnerView>>> {
    tracing::debug!("Listing runners for tenant: {}", caller.tenant_id);

    let runners = runner_service::list_runners(&state, &caller.tenant_id).await?;
    Ok(Json(runners))
}

/// GET /runners/{id}
/// Get details for a specific runner
pub async fn get_runner(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<RunnerView>> {
    tracing::debug!("Getting runner: {}", id);

    let runner = runner_service::get_runner(&state, &caller.tenant_id, &id).await?;
    Ok(Json(runner))
}
