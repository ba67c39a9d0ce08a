//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository trait covers one aggregate; `MemoryStore` and `PgStore`
//! implement all of them.

pub mod job;
pub mod memory;
pub mod pipeline;
pub mod runner;
pub mod test_run;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use verdict_core::domain::job::{Job, JobStatus};
use verdict_core::domain::pipeline::{Pipeline, PipelineStatus};
use verdict_core::domain::result::Verdict;
use verdict_core::domain::runner::Runner;
use verdict_core::domain::test_run::{TestCase, TestCaseRun, TestRun};
use verdict_core::dto::job::CreateJob;
use verdict_core::dto::pipeline::{Page, PipelineFilter};

pub use memory::MemoryStore;

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{0} not found")]
    Missing(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A pipeline about to be persisted together with its jobs
#[derive(Debug, Clone)]
pub struct NewPipeline {
    pub number: i64,
    pub tenant_id: String,
    pub project_id: i64,
    pub external_identifier: Option<String>,
    pub cicd_system: Option<String>,
    pub test_run_id: Option<i64>,
    pub jobs: Vec<CreateJob>,
}

/// A test case run about to be persisted
#[derive(Debug, Clone)]
pub struct NewTestCaseRun {
    pub test_run_id: i64,
    pub test_case_id: i64,
    pub suite_name: String,
    pub case_name: String,
    pub verdict: Verdict,
    pub duration_ms: i64,
    pub message: Option<String>,
}

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Persist a pipeline and its jobs; every job starts `Queued`.
    async fn create(&self, new: NewPipeline) -> StoreResult<Pipeline>;

    /// Load a pipeline with its jobs ordered by creation time.
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Pipeline>>;

    /// Newest first.
    async fn search(
        &self,
        tenant_id: &str,
        filter: &PipelineFilter,
        offset: u64,
        count: u64,
    ) -> StoreResult<Page<Pipeline>>;

    async fn update_status(&self, id: i64, status: PipelineStatus) -> StoreResult<()>;

    /// Highest pipeline number used in a project, 0 when none exist
    async fn max_number(&self, tenant_id: &str, project_id: i64) -> StoreResult<i64>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn find_by_guid(&self, guid: Uuid) -> StoreResult<Option<Job>>;

    /// Oldest first.
    async fn find_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;

    /// Move a job from `Queued` to `Dispatched`.
    ///
    /// Returns `false` without writing when the job is no longer queued.
    async fn mark_dispatched(
        &self,
        guid: Uuid,
        runner_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Overwrite the mutable lifecycle fields of a job.
    async fn update(&self, job: &Job) -> StoreResult<()>;
}

#[async_trait]
pub trait RunnerRepository: Send + Sync {
    /// Insert or replace the runner with the same id.
    async fn upsert(&self, runner: &Runner) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Runner>>;

    async fn list_by_tenant(&self, tenant_id: &str) -> StoreResult<Vec<Runner>>;

    /// Refresh `last_seen`; returns `false` for unknown runners.
    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool>;
}

#[async_trait]
pub trait TestRunRepository: Send + Sync {
    async fn create(
        &self,
        tenant_id: &str,
        project_id: i64,
        number: i64,
        name: &str,
    ) -> StoreResult<TestRun>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<TestRun>>;

    async fn max_number(&self, tenant_id: &str, project_id: i64) -> StoreResult<i64>;

    async fn find_or_create_test_case(
        &self,
        tenant_id: &str,
        project_id: i64,
        suite_name: &str,
        name: &str,
    ) -> StoreResult<TestCase>;

    async fn list_case_runs(&self, test_run_id: i64) -> StoreResult<Vec<TestCaseRun>>;

    async fn insert_case_run(&self, new: NewTestCaseRun) -> StoreResult<TestCaseRun>;

    async fn update_case_run(&self, run: &TestCaseRun) -> StoreResult<()>;
}

/// Bundle of repositories handed to services
#[derive(Clone)]
pub struct Store {
    pub pipelines: Arc<dyn PipelineRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub runners: Arc<dyn RunnerRepository>,
    pub test_runs: Arc<dyn TestRunRepository>,
}

impl Store {
    /// Process-local store; contents are lost on restart
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            pipelines: store.clone(),
            jobs: store.clone(),
            runners: store.clone(),
            test_runs: store,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            pipelines: store.clone(),
            jobs: store.clone(),
            runners: store.clone(),
            test_runs: store,
        }
    }
}

/// Postgres-backed implementation of every repository trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_column<T>(value: &str) -> StoreResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(StoreError::Corrupt)
}
