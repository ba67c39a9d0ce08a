//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::repository::StoreError;
use crate::service::{
    artifact_service::ArtifactError, job_service::JobError,
    pipeline_service::PipelineError, runner_service::RunnerError, test_run_service::TestRunError,
};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized,
    Store(StoreError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or unknown API key".to_string(),
            ),
            ApiError::Store(err) => {
                tracing::error!("Storage error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<RunnerError> for ApiError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::NotFound(id) => ApiError::NotFound(format!("Runner {} not found", id)),
            e @ RunnerError::OwnedByOtherTenant(_) => ApiError::Conflict(e.to_string()),
            RunnerError::Validation(msg) => ApiError::BadRequest(msg),
            RunnerError::Store(err) => ApiError::Store(err),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(guid) => ApiError::NotFound(format!("Job {} not found", guid)),
            JobError::RunnerNotFound(id) => ApiError::NotFound(format!("Runner {} not found", id)),
            e @ JobError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            JobError::Validation(msg) => ApiError::BadRequest(msg),
            JobError::Store(err) => ApiError::Store(err),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(id) => {
                ApiError::NotFound(format!("Pipeline {} not found", id))
            }
            PipelineError::TestRunNotFound(id) => {
                ApiError::NotFound(format!("Test run {} not found", id))
            }
            PipelineError::Validation(msg) => ApiError::BadRequest(msg),
            PipelineError::Store(err) => ApiError::Store(err),
        }
    }
}

impl From<TestRunError> for ApiError {
    fn from(err: TestRunError) -> Self {
        match err {
            TestRunError::NotFound(id) => ApiError::NotFound(format!("Test run {} not found", id)),
            TestRunError::Validation(msg) => ApiError::BadRequest(msg),
            TestRunError::Store(err) => ApiError::Store(err),
        }
    }
}

impl From<ArtifactError> for ApiError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::JobNotFound(guid) => {
                ApiError::NotFound(format!("Job {} not found", guid))
            }
            e @ ArtifactError::NoLinkedTestRun(_) => ApiError::BadRequest(e.to_string()),
            e @ ArtifactError::InvalidPattern(_) => ApiError::BadRequest(e.to_string()),
            e @ ArtifactError::Archive(_) => ApiError::BadRequest(e.to_string()),
            ArtifactError::Store(err) => ApiError::Store(err),
            ArtifactError::Extraction(msg) => ApiError::InternalError(msg),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use verdict_core::domain::job::JobStatus;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::from(JobError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (
                ApiError::from(JobError::InvalidTransition {
                    from: JobStatus::Succeeded,
                    to: JobStatus::Running,
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(ArtifactError::NoLinkedTestRun(3)),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(RunnerError::OwnedByOtherTenant("r1".to_string())),
                StatusCode::CONFLICT,
            ),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ApiError::from(StoreError::Corrupt("bad row".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
