//! Test Run Repository
//!
//! Postgres operations for test runs, the test case catalog and per-run results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use verdict_core::domain::test_run::{TestCase, TestCaseRun, TestRun};

use super::{NewTestCaseRun, PgStore, StoreError, StoreResult, TestRunRepository, parse_column};

#[async_trait]
impl TestRunRepository for PgStore {
    async fn create(
        &self,
        tenant_id: &str,
        project_id: i64,
        number: i64,
        name: &str,
    ) -> StoreResult<TestRun> {
        let run = sqlx::query_as::<_, TestRunRow>(
            r#"
            INSERT INTO test_runs (number, tenant_id, project_id, name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, number, tenant_id, project_id, name, created_at
            "#,
        )
        .bind(number)
        .bind(tenant_id)
        .bind(project_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(run.into())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<TestRun>> {
        let row = sqlx::query_as::<_, TestRunRow>(
            r#"
            SELECT id, number, tenant_id, project_id, name, created_at
            FROM test_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TestRun::from))
    }

    async fn max_number(&self, tenant_id: &str, project_id: i64) -> StoreResult<i64> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(number) FROM test_runs WHERE tenant_id = $1 AND project_id = $2",
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max.unwrap_or(0))
    }

    async fn find_or_create_test_case(
        &self,
        tenant_id: &str,
        project_id: i64,
        suite_name: &str,
        name: &str,
    ) -> StoreResult<TestCase> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, TestCaseRow>(
            r#"
            INSERT INTO test_cases (tenant_id, project_id, suite_name, name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, project_id, suite_name, name)
            DO UPDATE SET name = EXCLUDED.name
            RETURNING id, tenant_id, project_id, suite_name, name
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .bind(suite_name)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_case_runs(&self, test_run_id: i64) -> StoreResult<Vec<TestCaseRun>> {
        let rows = sqlx::query_as::<_, TestCaseRunRow>(
            r#"
            SELECT id, test_run_id, test_case_id, suite_name, case_name, verdict,
                   duration_ms, message, updated_at
            FROM test_case_runs
            WHERE test_run_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(test_run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TestCaseRun::try_from).collect()
    }

    async fn insert_case_run(&self, new: NewTestCaseRun) -> StoreResult<TestCaseRun> {
        let row = sqlx::query_as::<_, TestCaseRunRow>(
            r#"
            INSERT INTO test_case_runs (test_run_id, test_case_id, suite_name, case_name,
                                        verdict, duration_ms, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, test_run_id, test_case_id, suite_name, case_name, verdict,
                      duration_ms, message, updated_at
            "#,
        )
        .bind(new.test_run_id)
        .bind(new.test_case_id)
        .bind(&new.suite_name)
        .bind(&new.case_name)
        .bind(new.verdict.as_str())
        .bind(new.duration_ms)
        .bind(&new.message)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_case_run(&self, run: &TestCaseRun) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE test_case_runs
            SET verdict = $1, duration_ms = $2, message = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(run.verdict.as_str())
        .bind(run.duration_ms)
        .bind(&run.message)
        .bind(run.updated_at)
        .bind(run.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("test case run {}", run.id)));
        }

        Ok(())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TestRunRow {
    id: i64,
    number: i64,
    tenant_id: String,
    project_id: i64,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<TestRunRow> for TestRun {
    fn from(row: TestRunRow) -> Self {
        TestRun {
            id: row.id,
            number: row.number,
            tenant_id: row.tenant_id,
            project_id: row.project_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TestCaseRow {
    id: i64,
    tenant_id: String,
    project_id: i64,
    suite_name: String,
    name: String,
}

impl From<TestCaseRow> for TestCase {
    fn from(row: TestCaseRow) -> Self {
        TestCase {
            id: row.id,
            tenant_id: row.tenant_id,
            project_id: row.project_id,
            suite_name: row.suite_name,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TestCaseRunRow {
    id: i64,
    test_run_id: i64,
    test_case_id: i64,
    suite_name: String,
    case_name: String,
    verdict: String,
    duration_ms: i64,
    message: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TestCaseRunRow> for TestCaseRun {
    type Error = StoreError;

    fn try_from(row: TestCaseRunRow) -> StoreResult<Self> {
        Ok(TestCaseRun {
            id: row.id,
            test_run_id: row.test_run_id,
            test_case_id: row.test_case_id,
            suite_name: row.suite_name,
            case_name: row.case_name,
            verdict: parse_column(&row.verdict)?,
            duration_ms: row.duration_ms,
            message: row.message,
            updated_at: row.updated_at,
        })
    }
}
