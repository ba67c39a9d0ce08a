//! Job Repository
//!
//! Postgres operations for jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use verdict_core::domain::job::{Job, JobStatus};

use super::{JobRepository, PgStore, StoreError, StoreResult, parse_column};

#[async_trait]
impl JobRepository for PgStore {
    async fn find_by_guid(&self, guid: Uuid) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT guid, pipeline_id, tenant_id, runner_selector, status, created_at,
                   dispatched_at, started_at, finished_at, failure_reason, runner_id,
                   exit_code, script, artifact_patterns, result_format
            FROM jobs
            WHERE guid = $1
            "#,
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn find_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT guid, pipeline_id, tenant_id, runner_selector, status, created_at,
                   dispatched_at, started_at, finished_at, failure_reason, runner_id,
                   exit_code, script, artifact_patterns, result_format
            FROM jobs
            WHERE status = $1
            ORDER BY created_at ASC, guid ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn mark_dispatched(
        &self,
        guid: Uuid,
        runner_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, dispatched_at = $2, runner_id = $3
            WHERE guid = $4 AND status = $5
            "#,
        )
        .bind(JobStatus::Dispatched.as_str())
        .bind(at)
        .bind(runner_id)
        .bind(guid)
        .bind(JobStatus::Queued.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, dispatched_at = $2, started_at = $3, finished_at = $4,
                failure_reason = $5, runner_id = $6, exit_code = $7
            WHERE guid = $8
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.dispatched_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.failure_reason)
        .bind(&job.runner_id)
        .bind(job.exit_code)
        .bind(job.guid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("job {}", job.guid)));
        }

        Ok(())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
pub(super) struct JobRow {
    guid: Uuid,
    pipeline_id: i64,
    tenant_id: String,
    runner_selector: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    runner_id: Option<String>,
    exit_code: Option<i32>,
    script: Option<String>,
    artifact_patterns: Vec<String>,
    result_format: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        Ok(Job {
            guid: row.guid,
            pipeline_id: row.pipeline_id,
            tenant_id: row.tenant_id,
            runner_selector: row.runner_selector.into_iter().collect(),
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            dispatched_at: row.dispatched_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            failure_reason: row.failure_reason,
            runner_id: row.runner_id,
            exit_code: row.exit_code,
            script: row.script,
            artifact_patterns: row.artifact_patterns,
            result_format: row.result_format.as_deref().map(parse_column).transpose()?,
        })
    }
}
