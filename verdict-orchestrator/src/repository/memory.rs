//! In-memory store
//!
//! Used when no database is configured, and by tests. Every trait method
//! takes the single state lock for its whole body, so each call is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;
use verdict_core::domain::job::{Job, JobStatus};
use verdict_core::domain::pipeline::{Pipeline, PipelineStatus};
use verdict_core::domain::runner::Runner;
use verdict_core::domain::test_run::{TestCase, TestCaseRun, TestRun};
use verdict_core::dto::pipeline::{Page, PipelineFilter};

use super::{
    JobRepository, NewPipeline, NewTestCaseRun, PipelineRepository, RunnerRepository,
    StoreError, StoreResult, TestRunRepository,
};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    pipelines: BTreeMap<i64, Pipeline>,
    job_index: HashMap<Uuid, i64>,
    runners: BTreeMap<String, Runner>,
    test_runs: BTreeMap<i64, TestRun>,
    test_cases: BTreeMap<i64, TestCase>,
    case_runs: BTreeMap<i64, TestCaseRun>,
    last_pipeline_id: i64,
    last_test_run_id: i64,
    last_test_case_id: i64,
    last_case_run_id: i64,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn job_mut(&mut self, guid: Uuid) -> Option<&mut Job> {
        let pipeline_id = self.job_index.get(&guid)?;
        self.pipelines
            .get_mut(pipeline_id)?
            .jobs
            .iter_mut()
            .find(|j| j.guid == guid)
    }
}

fn matches_filter(pipeline: &Pipeline, tenant_id: &str, filter: &PipelineFilter) -> bool {
    pipeline.tenant_id == tenant_id
        && filter.project_id.is_none_or(|p| pipeline.project_id == p)
        && filter.status.is_none_or(|s| pipeline.status == s)
        && filter
            .external_identifier
            .as_ref()
            .is_none_or(|e| pipeline.external_identifier.as_ref() == Some(e))
        && filter
            .cicd_system
            .as_ref()
            .is_none_or(|c| pipeline.cicd_system.as_ref() == Some(c))
}

// =============================================================================
// Pipelines
// =============================================================================

#[async_trait]
impl PipelineRepository for MemoryStore {
    async fn create(&self, new: NewPipeline) -> StoreResult<Pipeline> {
        let mut state = self.lock();
        state.last_pipeline_id += 1;
        let id = state.last_pipeline_id;
        let now = Utc::now();

        let jobs: Vec<Job> = new
            .jobs
            .into_iter()
            .map(|spec| Job {
                guid: Uuid::new_v4(),
                pipeline_id: id,
                tenant_id: new.tenant_id.clone(),
                runner_selector: spec.tags,
                status: JobStatus::Queued,
                created_at: now,
                dispatched_at: None,
                started_at: None,
                finished_at: None,
                failure_reason: None,
                runner_id: None,
                exit_code: None,
                script: spec.script,
                artifact_patterns: spec.artifact_patterns,
                result_format: spec.result_format,
            })
            .collect();

        for job in &jobs {
            state.job_index.insert(job.guid, id);
        }

        let pipeline = Pipeline {
            id,
            number: new.number,
            tenant_id: new.tenant_id,
            project_id: new.project_id,
            external_identifier: new.external_identifier,
            cicd_system: new.cicd_system,
            status: PipelineStatus::Running,
            test_run_id: new.test_run_id,
            created_at: now,
            jobs,
        };
        state.pipelines.insert(id, pipeline.clone());
        Ok(pipeline)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Pipeline>> {
        Ok(self.lock().pipelines.get(&id).cloned())
    }

    async fn search(
        &self,
        tenant_id: &str,
        filter: &PipelineFilter,
        offset: u64,
        count: u64,
    ) -> StoreResult<Page<Pipeline>> {
        let state = self.lock();
        let matching: Vec<&Pipeline> = state
            .pipelines
            .values()
            .rev()
            .filter(|p| matches_filter(p, tenant_id, filter))
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(count).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    async fn update_status(&self, id: i64, status: PipelineStatus) -> StoreResult<()> {
        let mut state = self.lock();
        let pipeline = state
            .pipelines
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("pipeline {}", id)))?;
        pipeline.status = status;
        Ok(())
    }

    async fn max_number(&self, tenant_id: &str, project_id: i64) -> StoreResult<i64> {
        Ok(self
            .lock()
            .pipelines
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.project_id == project_id)
            .map(|p| p.number)
            .max()
            .unwrap_or(0))
    }
}

// =============================================================================
// Jobs
// =============================================================================

#[async_trait]
impl JobRepository for MemoryStore {
    async fn find_by_guid(&self, guid: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.lock().job_mut(guid).map(|j| j.clone()))
    }

    async fn find_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let state = self.lock();
        let mut jobs: Vec<Job> = state
            .pipelines
            .values()
            .flat_map(|p| p.jobs.iter())
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn mark_dispatched(
        &self,
        guid: Uuid,
        runner_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.job_mut(guid) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Dispatched;
                job.dispatched_at = Some(at);
                job.runner_id = Some(runner_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        let mut state = self.lock();
        let stored = state
            .job_mut(job.guid)
            .ok_or_else(|| StoreError::Missing(format!("job {}", job.guid)))?;

        stored.status = job.status;
        stored.dispatched_at = job.dispatched_at;
        stored.started_at = job.started_at;
        stored.finished_at = job.finished_at;
        stored.failure_reason = job.failure_reason.clone();
        stored.runner_id = job.runner_id.clone();
        stored.exit_code = job.exit_code;
        Ok(())
    }
}

// =============================================================================
// Runners
// =============================================================================

#[async_trait]
impl RunnerRepository for MemoryStore {
    async fn upsert(&self, runner: &Runner) -> StoreResult<()> {
        self.lock().runners.insert(runner.id.clone(), runner.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Runner>> {
        Ok(self.lock().runners.get(id).cloned())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> StoreResult<Vec<Runner>> {
        Ok(self
            .lock()
            .runners
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        match self.lock().runners.get_mut(id) {
            Some(runner) => {
                runner.last_seen = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Test Runs
// =============================================================================

#[async_trait]
impl TestRunRepository for MemoryStore {
    async fn create(
        &self,
        tenant_id: &str,
        project_id: i64,
        number: i64,
        name: &str,
    ) -> StoreResult<TestRun> {
        let mut state = self.lock();
        state.last_test_run_id += 1;
        let run = TestRun {
            id: state.last_test_run_id,
            number,
            tenant_id: tenant_id.to_string(),
            project_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.test_runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<TestRun>> {
        Ok(self.lock().test_runs.get(&id).cloned())
    }

    async fn max_number(&self, tenant_id: &str, project_id: i64) -> StoreResult<i64> {
        Ok(self
            .lock()
            .test_runs
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.project_id == project_id)
            .map(|r| r.number)
            .max()
            .unwrap_or(0))
    }

    async fn find_or_create_test_case(
        &self,
        tenant_id: &str,
        project_id: i64,
        suite_name: &str,
        name: &str,
    ) -> StoreResult<TestCase> {
        let mut state = self.lock();
        let existing = state.test_cases.values().find(|c| {
            c.tenant_id == tenant_id
                && c.project_id == project_id
                && c.suite_name == suite_name
                && c.name == name
        });
        if let Some(case) = existing {
            return Ok(case.clone());
        }

        state.last_test_case_id += 1;
        let case = TestCase {
            id: state.last_test_case_id,
            tenant_id: tenant_id.to_string(),
            project_id,
            suite_name: suite_name.to_string(),
            name: name.to_string(),
        };
        state.test_cases.insert(case.id, case.clone());
        Ok(case)
    }

    async fn list_case_runs(&self, test_run_id: i64) -> StoreResult<Vec<TestCaseRun>> {
        Ok(self
            .lock()
            .case_runs
            .values()
            .filter(|r| r.test_run_id == test_run_id)
            .cloned()
            .collect())
    }

    async fn insert_case_run(&self, new: NewTestCaseRun) -> StoreResult<TestCaseRun> {
        let mut state = self.lock();
        let duplicate = state.case_runs.values().any(|r| {
            r.test_run_id == new.test_run_id
                && r.suite_name == new.suite_name
                && r.case_name == new.case_name
        });
        if duplicate {
            return Err(StoreError::Corrupt(format!(
                "duplicate case run {}/{} in test run {}",
                new.suite_name, new.case_name, new.test_run_id
            )));
        }

        state.last_case_run_id += 1;
        let run = TestCaseRun {
            id: state.last_case_run_id,
            test_run_id: new.test_run_id,
            test_case_id: new.test_case_id,
            suite_name: new.suite_name,
            case_name: new.case_name,
            verdict: new.verdict,
            duration_ms: new.duration_ms,
            message: new.message,
            updated_at: Utc::now(),
        };
        state.case_runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_case_run(&self, run: &TestCaseRun) -> StoreResult<()> {
        let mut state = self.lock();
        let stored = state
            .case_runs
            .get_mut(&run.id)
            .ok_or_else(|| StoreError::Missing(format!("test case run {}", run.id)))?;
        *stored = run.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::domain::result::Verdict;
    use verdict_core::dto::job::CreateJob;

    fn new_pipeline(tenant: &str, project_id: i64, number: i64, jobs: usize) -> NewPipeline {
        NewPipeline {
            number,
            tenant_id: tenant.to_string(),
            project_id,
            external_identifier: Some(format!("build-{number}")),
            cicd_system: Some("github".to_string()),
            test_run_id: None,
            jobs: vec![CreateJob::default(); jobs],
        }
    }

    #[tokio::test]
    async fn test_create_pipeline_queues_jobs() {
        let store = MemoryStore::default();
        let pipeline = PipelineRepository::create(&store, new_pipeline("acme", 1, 1, 2))
            .await
            .unwrap();

        assert_eq!(pipeline.jobs.len(), 2);
        assert!(pipeline.jobs.iter().all(|j| j.status == JobStatus::Queued));

        let job = store.find_by_guid(pipeline.jobs[0].guid).await.unwrap();
        assert_eq!(job.unwrap().pipeline_id, pipeline.id);
    }

    #[tokio::test]
    async fn test_mark_dispatched_claims_once() {
        let store = MemoryStore::default();
        let pipeline = PipelineRepository::create(&store, new_pipeline("acme", 1, 1, 1))
            .await
            .unwrap();
        let guid = pipeline.jobs[0].guid;

        assert!(store.mark_dispatched(guid, "r1", Utc::now()).await.unwrap());
        assert!(!store.mark_dispatched(guid, "r2", Utc::now()).await.unwrap());

        let job = store.find_by_guid(guid).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dispatched);
        assert_eq!(job.runner_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_search_filters_by_tenant_and_pages_newest_first() {
        let store = MemoryStore::default();
        for number in 1..=3 {
            PipelineRepository::create(&store, new_pipeline("acme", 1, number, 0))
                .await
                .unwrap();
        }
        PipelineRepository::create(&store, new_pipeline("globex", 1, 1, 0))
            .await
            .unwrap();

        let page = store
            .search("acme", &PipelineFilter::default(), 0, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(
            page.items.iter().map(|p| p.number).collect::<Vec<_>>(),
            vec![3, 2]
        );

        let filter = PipelineFilter {
            external_identifier: Some("build-1".to_string()),
            ..Default::default()
        };
        let page = store.search("acme", &filter, 0, 20).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_find_or_create_test_case_is_stable() {
        let store = MemoryStore::default();
        let first = store
            .find_or_create_test_case("acme", 1, "math", "adds")
            .await
            .unwrap();
        let second = store
            .find_or_create_test_case("acme", 1, "math", "adds")
            .await
            .unwrap();
        let other = store
            .find_or_create_test_case("acme", 2, "math", "adds")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_duplicate_case_run_is_rejected() {
        let store = MemoryStore::default();
        let run = TestRunRepository::create(&store, "acme", 1, 1, "nightly")
            .await
            .unwrap();
        let new = NewTestCaseRun {
            test_run_id: run.id,
            test_case_id: 1,
            suite_name: "math".to_string(),
            case_name: "adds".to_string(),
            verdict: Verdict::Passed,
            duration_ms: 5,
            message: None,
        };

        store.insert_case_run(new.clone()).await.unwrap();
        assert!(store.insert_case_run(new).await.is_err());
    }
}
