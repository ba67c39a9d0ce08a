//! Pipeline Service
//!
//! Business logic for pipelines: creation, lookup, search, and the status
//! derived from their jobs.

use verdict_core::domain::pipeline::Pipeline;
use verdict_core::dto::pipeline::{CreatePipeline, Page, PipelineFilter};
use verdict_core::pattern::PatternSet;

use crate::events::DomainEvent;
use crate::repository::{NewPipeline, StoreError, StoreResult};
use crate::service::sequence::EntityType;
use crate::state::AppState;

/// Page size used when a search does not ask for one
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline not found: {0}")]
    NotFound(i64),

    #[error("test run not found: {0}")]
    TestRunNotFound(i64),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Create a pipeline and queue its jobs
pub async fn create_pipeline(
    state: &AppState,
    tenant_id: &str,
    project_id: i64,
    req: CreatePipeline,
) -> Result<Pipeline> {
    validate_create_request(project_id, &req)?;

    if let Some(test_run_id) = req.test_run_id {
        let run = state.store.test_runs.find_by_id(test_run_id).await?;
        if !run.is_some_and(|r| r.tenant_id == tenant_id && r.project_id == project_id) {
            return Err(PipelineError::TestRunNotFound(test_run_id));
        }
    }

    let pipelines = state.store.pipelines.clone();
    let number = state
        .sequences
        .next(tenant_id, project_id, EntityType::Pipeline, move |tenant, project| async move {
            pipelines.max_number(&tenant, project).await
        })
        .await?;

    let pipeline = state
        .store
        .pipelines
        .create(NewPipeline {
            number,
            tenant_id: tenant_id.to_string(),
            project_id,
            external_identifier: req.external_identifier,
            cicd_system: req.cicd_system,
            test_run_id: req.test_run_id,
            jobs: req.jobs,
        })
        .await?;

    for job in &pipeline.jobs {
        state.dispatcher.enqueue(job.clone()).await;
        state
            .events
            .publish(DomainEvent::JobEnqueued {
                guid: job.guid,
                pipeline_id: pipeline.id,
                tenant_id: tenant_id.to_string(),
            })
            .await;
    }

    tracing::info!(
        "Pipeline created: {} (#{} in project {}, {} jobs)",
        pipeline.id,
        pipeline.number,
        project_id,
        pipeline.jobs.len()
    );

    Ok(pipeline)
}

/// Get a pipeline by ID with its status derived from the current jobs
pub async fn get_pipeline(state: &AppState, tenant_id: &str, id: i64) -> Result<Pipeline> {
    let mut pipeline = state
        .store
        .pipelines
        .find_by_id(id)
        .await?
        .filter(|p| p.tenant_id == tenant_id)
        .ok_or(PipelineError::NotFound(id))?;

    pipeline.refresh_status();
    Ok(pipeline)
}

/// Search pipelines, newest first
pub async fn search_pipelines(
    state: &AppState,
    tenant_id: &str,
    filter: &PipelineFilter,
    offset: Option<u64>,
    count: Option<u64>,
) -> Result<Page<Pipeline>> {
    let offset = offset.unwrap_or(0);
    let count = count.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let mut page = state
        .store
        .pipelines
        .search(tenant_id, filter, offset, count)
        .await?;

    for pipeline in &mut page.items {
        pipeline.refresh_status();
    }

    tracing::debug!("Pipeline search for {} returned {} of {}", tenant_id, page.items.len(), page.total);
    Ok(page)
}

/// Re-derive a pipeline's status from its jobs and persist it when changed.
///
/// Runs under a per-pipeline lock so one change is published once.
/// Returns `None` if the pipeline no longer exists.
pub async fn recompute(state: &AppState, pipeline_id: i64) -> StoreResult<Option<Pipeline>> {
    let _guard = state.pipeline_locks.lock(pipeline_id).await;

    let Some(mut pipeline) = state.store.pipelines.find_by_id(pipeline_id).await? else {
        return Ok(None);
    };

    let previous = pipeline.status;
    pipeline.refresh_status();

    if pipeline.status != previous {
        state
            .store
            .pipelines
            .update_status(pipeline_id, pipeline.status)
            .await?;

        tracing::info!(
            "Pipeline {} status changed: {} -> {}",
            pipeline_id,
            previous,
            pipeline.status
        );

        state
            .events
            .publish(DomainEvent::PipelineStatusChanged {
                pipeline_id,
                from: previous,
                to: pipeline.status,
            })
            .await;
    }

    Ok(Some(pipeline))
}

// =============================================================================
// Validation
// =============================================================================

fn validate_create_request(project_id: i64, req: &CreatePipeline) -> Result<()> {
    if project_id <= 0 {
        return Err(PipelineError::Validation(
            "Project ID must be positive".to_string(),
        ));
    }

    if req
        .external_identifier
        .as_ref()
        .is_some_and(|id| id.len() > 255)
    {
        return Err(PipelineError::Validation(
            "External identifier is too long (max 255 characters)".to_string(),
        ));
    }

    for (index, job) in req.jobs.iter().enumerate() {
        let patterns = PatternSet::new(&job.artifact_patterns).map_err(|e| {
            PipelineError::Validation(format!(
                "Job {} has an invalid artifact pattern: {}",
                index, e
            ))
        })?;

        // An empty list falls back to the defaults; a list of only
        // exclusions or blanks would select nothing.
        if !job.artifact_patterns.is_empty() && patterns.is_empty() {
            return Err(PipelineError::Validation(format!(
                "Job {} artifact patterns select no files",
                index
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::{EventBus, EventHandler};
    use crate::repository::Store;
    use crate::service::testing;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verdict_core::domain::job::JobStatus;
    use verdict_core::domain::pipeline::PipelineStatus;
    use verdict_core::dto::job::CreateJob;

    fn request(jobs: usize) -> CreatePipeline {
        CreatePipeline {
            external_identifier: Some("gh-run-42".to_string()),
            cicd_system: Some("github".to_string()),
            test_run_id: None,
            jobs: vec![CreateJob::default(); jobs],
        }
    }

    #[test]
    fn test_validate_create_request() {
        assert!(validate_create_request(1, &request(1)).is_ok());
        assert!(validate_create_request(0, &request(1)).is_err());

        let mut bad = request(1);
        bad.jobs[0].artifact_patterns = vec!["reports/[".to_string()];
        assert!(validate_create_request(1, &bad).is_err());

        let mut excludes_only = request(1);
        excludes_only.jobs[0].artifact_patterns = vec!["!**/*.log".to_string()];
        assert!(validate_create_request(1, &excludes_only).is_err());

        let mut with_include = request(1);
        with_include.jobs[0].artifact_patterns =
            vec!["reports/*.xml".to_string(), "!**/*.log".to_string()];
        assert!(validate_create_request(1, &with_include).is_ok());
    }

    #[tokio::test]
    async fn test_create_numbers_per_project_and_enqueues() {
        let state = testing::state();

        let first = create_pipeline(&state, "acme", 7, request(2)).await.unwrap();
        let second = create_pipeline(&state, "acme", 7, request(0)).await.unwrap();
        let other = create_pipeline(&state, "acme", 8, request(0)).await.unwrap();

        assert_eq!((first.number, second.number, other.number), (1, 2, 1));
        assert!(first.jobs.iter().all(|j| j.status == JobStatus::Queued));
        assert_eq!(state.dispatcher.queued_len("acme").await, 2);
        assert_eq!(second.status, PipelineStatus::Running);
    }

    #[tokio::test]
    async fn test_numbering_resumes_after_restart() {
        let state = testing::state();
        create_pipeline(&state, "acme", 1, request(0)).await.unwrap();
        create_pipeline(&state, "acme", 1, request(0)).await.unwrap();

        state.sequences.reset().await;
        let next = create_pipeline(&state, "acme", 1, request(0)).await.unwrap();
        assert_eq!(next.number, 3);
    }

    #[tokio::test]
    async fn test_unknown_test_run_is_rejected() {
        let state = testing::state();
        let mut req = request(1);
        req.test_run_id = Some(99);

        assert!(matches!(
            create_pipeline(&state, "acme", 1, req).await,
            Err(PipelineError::TestRunNotFound(99))
        ));
        assert_eq!(state.dispatcher.queued_len("acme").await, 0);
    }

    #[tokio::test]
    async fn test_get_is_tenant_scoped() {
        let state = testing::state();
        let pipeline = create_pipeline(&state, "acme", 1, request(1)).await.unwrap();

        assert!(get_pipeline(&state, "acme", pipeline.id).await.is_ok());
        assert!(matches!(
            get_pipeline(&state, "globex", pipeline.id).await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_clamps_page_size() {
        let state = testing::state();
        for _ in 0..3 {
            create_pipeline(&state, "acme", 1, request(0)).await.unwrap();
        }

        let page = search_pipelines(&state, "acme", &PipelineFilter::default(), None, Some(0))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].number, 3);

        let filter = PipelineFilter {
            project_id: Some(2),
            ..Default::default()
        };
        let page = search_pipelines(&state, "acme", &filter, None, None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[derive(Default)]
    struct StatusChanges(AtomicUsize);

    #[async_trait]
    impl EventHandler for StatusChanges {
        fn name(&self) -> &'static str {
            "status_changes"
        }

        async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
            if matches!(event, DomainEvent::PipelineStatusChanged { .. }) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_recompute_publishes_once() {
        let changes = Arc::new(StatusChanges::default());
        let state = AppState::new(
            Config::default(),
            Store::memory(),
            EventBus::new(vec![changes.clone()]),
        );
        let pipeline = create_pipeline(&state, "acme", 1, request(2)).await.unwrap();

        for job in &pipeline.jobs {
            let mut job = job.clone();
            job.status = JobStatus::Succeeded;
            state.store.jobs.update(&job).await.unwrap();
        }

        let (a, b) = tokio::join!(
            recompute(&state, pipeline.id),
            recompute(&state, pipeline.id)
        );
        assert_eq!(a.unwrap().unwrap().status, PipelineStatus::Succeeded);
        assert_eq!(b.unwrap().unwrap().status, PipelineStatus::Succeeded);
        assert_eq!(changes.0.load(Ordering::SeqCst), 1);

        let stored = state.store.pipelines.find_by_id(pipeline.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PipelineStatus::Succeeded);
    }
}
