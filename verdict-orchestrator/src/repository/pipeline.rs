//! Pipeline Repository
//!
//! Postgres operations for pipelines and the jobs they own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;
use verdict_core::domain::job::{Job, JobStatus};
use verdict_core::domain::pipeline::{Pipeline, PipelineStatus};
use verdict_core::dto::pipeline::{Page, PipelineFilter};

use super::job::JobRow;
use super::{NewPipeline, PgStore, PipelineRepository, StoreError, StoreResult, parse_column};

#[async_trait]
impl PipelineRepository for PgStore {
    async fn create(&self, new: NewPipeline) -> StoreResult<Pipeline> {
        let mut tx = self.pool.begin().await?;
        let status = PipelineStatus::Running;

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO pipelines (number, tenant_id, project_id, external_identifier, cicd_system, status, test_run_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(new.number)
        .bind(&new.tenant_id)
        .bind(new.project_id)
        .bind(&new.external_identifier)
        .bind(&new.cicd_system)
        .bind(status.as_str())
        .bind(new.test_run_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut jobs = Vec::with_capacity(new.jobs.len());
        for spec in new.jobs {
            let job = Job {
                guid: Uuid::new_v4(),
                pipeline_id: id,
                tenant_id: new.tenant_id.clone(),
                runner_selector: spec.tags,
                status: JobStatus::Queued,
                created_at: Utc::now(),
                dispatched_at: None,
                started_at: None,
                finished_at: None,
                failure_reason: None,
                runner_id: None,
                exit_code: None,
                script: spec.script,
                artifact_patterns: spec.artifact_patterns,
                result_format: spec.result_format,
            };

            sqlx::query(
                r#"
                INSERT INTO jobs (guid, pipeline_id, tenant_id, runner_selector, status, created_at,
                                  script, artifact_patterns, result_format)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(job.guid)
            .bind(job.pipeline_id)
            .bind(&job.tenant_id)
            .bind(job.runner_selector.iter().cloned().collect::<Vec<_>>())
            .bind(job.status.as_str())
            .bind(job.created_at)
            .bind(&job.script)
            .bind(&job.artifact_patterns)
            .bind(job.result_format.map(|f| f.as_str()))
            .execute(&mut *tx)
            .await?;

            jobs.push(job);
        }

        tx.commit().await?;

        Ok(Pipeline {
            id,
            number: new.number,
            tenant_id: new.tenant_id,
            project_id: new.project_id,
            external_identifier: new.external_identifier,
            cicd_system: new.cicd_system,
            status,
            test_run_id: new.test_run_id,
            created_at,
            jobs,
        })
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, number, tenant_id, project_id, external_identifier, cicd_system,
                   status, test_run_id, created_at
            FROM pipelines
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut jobs = self.jobs_for(&[id]).await?;
        let mut pipeline = Pipeline::try_from(row)?;
        pipeline.jobs = jobs.remove(&id).unwrap_or_default();
        Ok(Some(pipeline))
    }

    async fn search(
        &self,
        tenant_id: &str,
        filter: &PipelineFilter,
        offset: u64,
        count: u64,
    ) -> StoreResult<Page<Pipeline>> {
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM pipelines
            WHERE tenant_id = $1
              AND ($2::BIGINT IS NULL OR project_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
              AND ($4::TEXT IS NULL OR external_identifier = $4)
              AND ($5::TEXT IS NULL OR cicd_system = $5)
            "#,
        )
        .bind(tenant_id)
        .bind(filter.project_id)
        .bind(status)
        .bind(&filter.external_identifier)
        .bind(&filter.cicd_system)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, number, tenant_id, project_id, external_identifier, cicd_system,
                   status, test_run_id, created_at
            FROM pipelines
            WHERE tenant_id = $1
              AND ($2::BIGINT IS NULL OR project_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
              AND ($4::TEXT IS NULL OR external_identifier = $4)
              AND ($5::TEXT IS NULL OR cicd_system = $5)
            ORDER BY id DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(tenant_id)
        .bind(filter.project_id)
        .bind(status)
        .bind(&filter.external_identifier)
        .bind(&filter.cicd_system)
        .bind(i64::try_from(count).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut jobs = self.jobs_for(&ids).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let mut pipeline = Pipeline::try_from(row)?;
                pipeline.jobs = jobs.remove(&pipeline.id).unwrap_or_default();
                Ok(pipeline)
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn update_status(&self, id: i64, status: PipelineStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE pipelines SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("pipeline {}", id)));
        }

        Ok(())
    }

    async fn max_number(&self, tenant_id: &str, project_id: i64) -> StoreResult<i64> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(number) FROM pipelines WHERE tenant_id = $1 AND project_id = $2",
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max.unwrap_or(0))
    }
}

impl PgStore {
    /// Load the jobs of several pipelines at once, grouped by pipeline id.
    async fn jobs_for(&self, pipeline_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<Job>>> {
        if pipeline_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT guid, pipeline_id, tenant_id, runner_selector, status, created_at,
                   dispatched_at, started_at, finished_at, failure_reason, runner_id,
                   exit_code, script, artifact_patterns, result_format
            FROM jobs
            WHERE pipeline_id = ANY($1)
            ORDER BY created_at ASC, guid ASC
            "#,
        )
        .bind(pipeline_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<Job>> = HashMap::new();
        for row in rows {
            let job = Job::try_from(row)?;
            grouped.entry(job.pipeline_id).or_default().push(job);
        }
        Ok(grouped)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: i64,
    number: i64,
    tenant_id: String,
    project_id: i64,
    external_identifier: Option<String>,
    cicd_system: Option<String>,
    status: String,
    test_run_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PipelineRow> for Pipeline {
    type Error = StoreError;

    fn try_from(row: PipelineRow) -> StoreResult<Self> {
        Ok(Pipeline {
            id: row.id,
            number: row.number,
            tenant_id: row.tenant_id,
            project_id: row.project_id,
            external_identifier: row.external_identifier,
            cicd_system: row.cicd_system,
            status: parse_column(&row.status)?,
            test_run_id: row.test_run_id,
            created_at: row.created_at,
            jobs: Vec::new(),
        })
    }
}
