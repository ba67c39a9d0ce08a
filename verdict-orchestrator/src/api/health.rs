//! Health Check API Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::auth::Caller;
use crate::service::runner_service;
use crate::state::AppState;

/// GET /health
/// Liveness probe, no API key required
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /runner/_health[?runnerId=]
/// Lets a runner verify its API key before connecting. With `runnerId`,
/// answers 503 unless that runner is connected and seen recently.
pub async fn runner_health(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<HealthQuery>,
) -> ApiResult<impl IntoResponse> {
    tracing::debug!("Runner health check for tenant: {}", caller.tenant_id);

    if let Some(runner_id) = params.runner_id {
        if !runner_service::health(&state, &caller.tenant_id, &runner_id).await? {
            return Ok((StatusCode::SERVICE_UNAVAILABLE, "Runner is not healthy"));
        }
    }

    Ok((StatusCode::OK, "OK"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthQuery {
    pub runner_id: Option<String>,
}
