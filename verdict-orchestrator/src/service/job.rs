//! Job Service
//!
//! Business logic for job dispatch and lifecycle.
//!
//! Status changes for one job are serialized by a per-guid lock; changes
//! to different jobs never wait on each other.

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use verdict_core::domain::job::{Job, JobStatus};
use verdict_core::dto::job::JobStatusUpdate;

use crate::events::DomainEvent;
use crate::repository::StoreError;
use crate::service::pipeline;
use crate::service::runner::{self, RunnerError};
use crate::state::AppState;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("runner not found: {0}")]
    RunnerNotFound(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RunnerError> for JobError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::NotFound(id) | RunnerError::OwnedByOtherTenant(id) => {
                JobError::RunnerNotFound(id)
            }
            RunnerError::Validation(msg) => JobError::Validation(msg),
            RunnerError::Store(err) => JobError::Store(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Long-poll for the next job a runner may execute
///
/// Waits up to `wait` (server default when `None`, capped by the configured
/// maximum). Returns `None` on timeout or server shutdown.
pub async fn next_job(
    state: &AppState,
    tenant_id: &str,
    runner_id: &str,
    wait: Option<Duration>,
) -> Result<Option<Job>> {
    let runner = runner::find_for_tenant(state, tenant_id, runner_id).await?;
    state.store.runners.touch(runner_id, Utc::now()).await?;

    let wait = wait
        .unwrap_or(state.config.long_poll_timeout)
        .min(state.config.long_poll_max);

    let job = state
        .dispatcher
        .try_dispatch(tenant_id, runner_id, &runner.tags, wait, &state.shutdown)
        .await?;

    match &job {
        Some(job) => {
            state
                .events
                .publish(DomainEvent::JobStatusChanged {
                    guid: job.guid,
                    pipeline_id: job.pipeline_id,
                    runner_id: Some(runner_id.to_string()),
                    from: JobStatus::Queued,
                    to: JobStatus::Dispatched,
                })
                .await;
        }
        None => tracing::debug!("No job for runner {} after {:?}", runner_id, wait),
    }

    Ok(job)
}

/// Apply a status report from a runner
///
/// The job is identified by its guid alone; `runner_id` is recorded as the
/// last reporter. A missing `status` is derived from `exitCode`. Reporting
/// the status a job already has is accepted and changes nothing.
pub async fn update_status(
    state: &AppState,
    tenant_id: &str,
    runner_id: &str,
    guid: Uuid,
    update: JobStatusUpdate,
) -> Result<Job> {
    let next = update.requested_status().ok_or_else(|| {
        JobError::Validation("Either status or exitCode is required".to_string())
    })?;

    apply_transition(
        state,
        tenant_id,
        guid,
        Some(runner_id),
        next,
        update.exit_code,
        update.message,
    )
    .await
}

/// Cancel a job on behalf of a user
///
/// Queued jobs are withdrawn from the dispatcher so no runner receives them.
pub async fn cancel_job(state: &AppState, tenant_id: &str, guid: Uuid) -> Result<Job> {
    apply_transition(
        state,
        tenant_id,
        guid,
        None,
        JobStatus::Canceled,
        None,
        Some("Canceled by user".to_string()),
    )
    .await
}

async fn apply_transition(
    state: &AppState,
    tenant_id: &str,
    guid: Uuid,
    runner_id: Option<&str>,
    next: JobStatus,
    exit_code: Option<i32>,
    message: Option<String>,
) -> Result<Job> {
    let _guard = state.job_locks.lock(guid).await;

    if next == JobStatus::Canceled && runner_id.is_none() {
        state.dispatcher.withdraw(tenant_id, guid).await;
    }

    let mut job = state
        .store
        .jobs
        .find_by_guid(guid)
        .await?
        .filter(|j| j.tenant_id == tenant_id)
        .ok_or(JobError::NotFound(guid))?;

    if job.status == next {
        tracing::debug!("Job {} already {}", guid, next);
        return Ok(job);
    }

    validate_transition(job.status, next)?;

    let previous = job.status;
    let now = Utc::now();
    job.status = next;

    if let Some(runner_id) = runner_id {
        if job.runner_id.as_deref() != Some(runner_id) {
            tracing::info!(
                "Job {} reported by {} (dispatched to {:?})",
                guid,
                runner_id,
                job.runner_id
            );
            job.runner_id = Some(runner_id.to_string());
        }
    }

    if next == JobStatus::Running {
        job.started_at.get_or_insert(now);
    }
    if next.is_terminal() {
        job.finished_at = Some(now);
    }
    if exit_code.is_some() {
        job.exit_code = exit_code;
    }
    if matches!(next, JobStatus::Failed | JobStatus::Canceled) {
        job.failure_reason = message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| exit_code.map(|code| format!("Exited with code {}", code)));
    }

    state.store.jobs.update(&job).await?;

    tracing::info!("Job {} status changed: {} -> {}", guid, previous, next);

    state
        .events
        .publish(DomainEvent::JobStatusChanged {
            guid,
            pipeline_id: job.pipeline_id,
            runner_id: runner_id.map(str::to_string),
            from: previous,
            to: next,
        })
        .await;

    if next.is_terminal() {
        let pipeline = pipeline::recompute(state, job.pipeline_id).await?;
        if let Some(test_run_id) = pipeline.and_then(|p| p.test_run_id) {
            state
                .events
                .publish(DomainEvent::ArtifactsExpected {
                    guid,
                    pipeline_id: job.pipeline_id,
                    test_run_id,
                })
                .await;
        }
    }

    Ok(job)
}

// =============================================================================
// Validation
// =============================================================================

/// `Dispatched` is only ever entered through the dispatcher.
fn validate_transition(from: JobStatus, to: JobStatus) -> Result<()> {
    if to == JobStatus::Dispatched || !from.can_transition_to(to) {
        return Err(JobError::InvalidTransition { from, to });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{pipeline, runner, testing};
    use std::collections::BTreeSet;
    use verdict_core::domain::pipeline::PipelineStatus;
    use verdict_core::dto::job::CreateJob;
    use verdict_core::dto::pipeline::CreatePipeline;
    use verdict_core::dto::runner::ConnectRunner;

    #[test]
    fn test_validate_transition() {
        use JobStatus::*;

        assert!(validate_transition(Dispatched, Running).is_ok());
        assert!(validate_transition(Running, Succeeded).is_ok());
        assert!(validate_transition(Queued, Canceled).is_ok());

        assert!(validate_transition(Queued, Dispatched).is_err());
        assert!(validate_transition(Queued, Running).is_err());
        assert!(validate_transition(Succeeded, Running).is_err());
        assert!(validate_transition(Canceled, Failed).is_err());
    }

    async fn setup(state: &AppState, jobs: usize) -> Vec<Job> {
        runner::connect(
            state,
            "acme",
            ConnectRunner {
                id: "r1".to_string(),
                name: "builder".to_string(),
                tags: BTreeSet::new(),
            },
        )
        .await
        .unwrap();

        pipeline::create_pipeline(
            state,
            "acme",
            1,
            CreatePipeline {
                jobs: vec![CreateJob::default(); jobs],
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .jobs
    }

    fn report(status: JobStatus) -> JobStatusUpdate {
        JobStatusUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_completes_pipeline() {
        let state = testing::state();
        let jobs = setup(&state, 1).await;

        let job = next_job(&state, "acme", "r1", Some(Duration::ZERO))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.guid, jobs[0].guid);

        let running = update_status(&state, "acme", "r1", job.guid, report(JobStatus::Running))
            .await
            .unwrap();
        assert!(running.started_at.is_some());

        let done = update_status(
            &state,
            "acme",
            "r1",
            job.guid,
            JobStatusUpdate {
                exit_code: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.exit_code, Some(0));
        assert!(done.finished_at.is_some());

        let pipeline = state
            .store
            .pipelines
            .find_by_id(job.pipeline_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_illegal_transition_leaves_job_untouched() {
        let state = testing::state();
        setup(&state, 1).await;
        let job = next_job(&state, "acme", "r1", Some(Duration::ZERO))
            .await
            .unwrap()
            .unwrap();

        update_status(&state, "acme", "r1", job.guid, report(JobStatus::Failed))
            .await
            .unwrap();

        let err = update_status(&state, "acme", "r1", job.guid, report(JobStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Running
            }
        ));

        let stored = state.store.jobs.find_by_guid(job.guid).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_repeated_report_is_idempotent() {
        let state = testing::state();
        setup(&state, 1).await;
        let job = next_job(&state, "acme", "r1", Some(Duration::ZERO))
            .await
            .unwrap()
            .unwrap();

        let first = update_status(&state, "acme", "r1", job.guid, report(JobStatus::Running))
            .await
            .unwrap();
        let second = update_status(&state, "acme", "r1", job.guid, report(JobStatus::Running))
            .await
            .unwrap();
        assert_eq!(first.started_at, second.started_at);
    }

    #[tokio::test]
    async fn test_failure_reason_from_exit_code() {
        let state = testing::state();
        setup(&state, 1).await;
        let job = next_job(&state, "acme", "r1", Some(Duration::ZERO))
            .await
            .unwrap()
            .unwrap();

        let failed = update_status(
            &state,
            "acme",
            "r1",
            job.guid,
            JobStatusUpdate {
                exit_code: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("Exited with code 3"));
    }

    #[tokio::test]
    async fn test_update_requires_status_or_exit_code() {
        let state = testing::state();
        let jobs = setup(&state, 1).await;
        assert!(matches!(
            update_status(&state, "acme", "r1", jobs[0].guid, JobStatusUpdate::default()).await,
            Err(JobError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_report_from_another_runner_is_applied() {
        let state = testing::state();
        setup(&state, 1).await;
        let job = next_job(&state, "acme", "r1", Some(Duration::ZERO))
            .await
            .unwrap()
            .unwrap();

        let running = update_status(&state, "acme", "r1-restarted", job.guid, report(JobStatus::Running))
            .await
            .unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert_eq!(running.runner_id.as_deref(), Some("r1-restarted"));

        update_status(&state, "acme", "r2", job.guid, report(JobStatus::Succeeded))
            .await
            .unwrap();

        let stored = state.store.jobs.find_by_guid(job.guid).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert_eq!(stored.runner_id.as_deref(), Some("r2"));
        let pipeline = pipeline::get_pipeline(&state, "acme", job.pipeline_id)
            .await
            .unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_report_for_other_tenant_job_is_not_found() {
        let state = testing::state();
        let jobs = setup(&state, 1).await;
        assert!(matches!(
            update_status(&state, "globex", "r1", jobs[0].guid, report(JobStatus::Canceled)).await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_withdraws_queued_job() {
        let state = testing::state();
        let jobs = setup(&state, 2).await;

        let canceled = cancel_job(&state, "acme", jobs[0].guid).await.unwrap();
        assert_eq!(canceled.status, JobStatus::Canceled);
        assert_eq!(state.dispatcher.queued_len("acme").await, 1);

        let next = next_job(&state, "acme", "r1", Some(Duration::ZERO))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.guid, jobs[1].guid);

        update_status(&state, "acme", "r1", next.guid, report(JobStatus::Succeeded))
            .await
            .unwrap();
        let pipeline = pipeline::get_pipeline(&state, "acme", next.pipeline_id)
            .await
            .unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Failed);
    }

    #[tokio::test]
    async fn test_poll_from_unknown_runner() {
        let state = testing::state();
        assert!(matches!(
            next_job(&state, "acme", "ghost", Some(Duration::ZERO)).await,
            Err(JobError::RunnerNotFound(_))
        ));
    }
}
