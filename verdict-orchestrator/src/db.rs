use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Test runs come first; pipelines reference them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS test_runs (
            id BIGSERIAL PRIMARY KEY,
            number BIGINT NOT NULL,
            tenant_id VARCHAR(255) NOT NULL,
            project_id BIGINT NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (tenant_id, project_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id BIGSERIAL PRIMARY KEY,
            number BIGINT NOT NULL,
            tenant_id VARCHAR(255) NOT NULL,
            project_id BIGINT NOT NULL,
            external_identifier TEXT,
            cicd_system VARCHAR(255),
            status VARCHAR(50) NOT NULL,
            test_run_id BIGINT REFERENCES test_runs(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (tenant_id, project_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            guid UUID PRIMARY KEY,
            pipeline_id BIGINT NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            tenant_id VARCHAR(255) NOT NULL,
            runner_selector TEXT[] NOT NULL DEFAULT '{}',
            status VARCHAR(50) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            dispatched_at TIMESTAMPTZ,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ,
            failure_reason TEXT,
            runner_id VARCHAR(255),
            exit_code INTEGER,
            script TEXT,
            artifact_patterns TEXT[] NOT NULL DEFAULT '{}',
            result_format VARCHAR(20)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create runners table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runners (
            id VARCHAR(255) PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            tags TEXT[] NOT NULL DEFAULT '{}',
            tenant_id VARCHAR(255) NOT NULL,
            last_seen TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Test case catalog and per-run results
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS test_cases (
            id BIGSERIAL PRIMARY KEY,
            tenant_id VARCHAR(255) NOT NULL,
            project_id BIGINT NOT NULL,
            suite_name TEXT NOT NULL,
            name TEXT NOT NULL,
            UNIQUE (tenant_id, project_id, suite_name, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS test_case_runs (
            id BIGSERIAL PRIMARY KEY,
            test_run_id BIGINT NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
            test_case_id BIGINT NOT NULL REFERENCES test_cases(id),
            suite_name TEXT NOT NULL,
            case_name TEXT NOT NULL,
            verdict VARCHAR(20) NOT NULL,
            duration_ms BIGINT NOT NULL DEFAULT 0,
            message TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (test_run_id, suite_name, case_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, created_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_pipeline_id ON jobs(pipeline_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipelines_tenant_project ON pipelines(tenant_id, project_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_runners_tenant ON runners(tenant_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
