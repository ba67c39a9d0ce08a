//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod artifact;
pub mod error;
pub mod health;
pub mod job;
pub mod pipeline;
pub mod runner;
pub mod test_run;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_upload = state.config.max_artifact_bytes;

    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/runner/_health", get(health::runner_health))
        // Runner-facing endpoints
        .route("/runner/connect", post(runner::connect_runner))
        .route("/runner/{runner_id}/jobs", get(job::poll_job))
        .route("/runner/{runner_id}/jobs/{guid}", post(job::update_job_status))
        .route(
            "/runner/{runner_id}/jobs/{guid}/artifacts",
            post(artifact::upload_artifacts).layer(DefaultBodyLimit::max(max_upload)),
        )
        // Runner queries
        .route("/runners", get(runner::list_runners))
        .route("/runners/{id}", get(runner::get_runner))
        // Pipeline endpoints
        .route(
            "/projects/{project_id}/pipelines",
            post(pipeline::create_pipeline),
        )
        .route("/pipelines", get(pipeline::search_pipelines))
        .route("/pipelines/{id}", get(pipeline::get_pipeline))
        // Job management
        .route("/jobs/{guid}/cancel", post(job::cancel_job))
        // Test run endpoints
        .route("/projects/{project_id}/runs", post(test_run::create_test_run))
        .route("/runs/{id}/results", get(test_run::get_results))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
