//! Runner Repository
//!
//! Postgres operations for runners.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use verdict_core::domain::runner::Runner;

use super::{PgStore, RunnerRepository, StoreResult};

#[async_trait]
impl RunnerRepository for PgStore {
    async fn upsert(&self, runner: &Runner) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO runners (id, name, tags, tenant_id, last_seen)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                tags = EXCLUDED.tags,
                tenant_id = EXCLUDED.tenant_id,
                last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(&runner.id)
        .bind(&runner.name)
        .bind(runner.tags.iter().cloned().collect::<Vec<_>>())
        .bind(&runner.tenant_id)
        .bind(runner.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Runner>> {
        let row = sqlx::query_as::<_, RunnerRow>(
            "SELECT id, name, tags, tenant_id, last_seen FROM runners WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Runner::from))
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> StoreResult<Vec<Runner>> {
        let rows = sqlx::query_as::<_, RunnerRow>(
            r#"
            SELECT id, name, tags, tenant_id, last_seen
            FROM runners
            WHERE tenant_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Runner::from).collect())
    }

    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE runners SET last_seen = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunnerRow {
    id: String,
    name: String,
    tags: Vec<String>,
    tenant_id: String,
    last_seen: DateTime<Utc>,
}

impl From<RunnerRow> for Runner {
    fn from(row: RunnerRow) -> Self {
        Runner {
            id: row.id,
            name: row.name,
            tags: row.tags.into_iter().collect(),
            tenant_id: row.tenant_id,
            last_seen: row.last_seen,
        }
    }
}
