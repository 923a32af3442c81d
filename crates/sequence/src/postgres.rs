use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::Result;
use crate::store::{SequenceKey, SequenceRow, SequenceStore, Version};

/// PostgreSQL-backed sequence store over `document_sequences`.
#[derive(Clone)]
pub struct PostgresSequenceStore {
    pool: PgPool,
}

impl PostgresSequenceStore {
    /// Creates a new PostgreSQL sequence store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SequenceStore for PostgresSequenceStore {
    async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceRow>> {
        let row = sqlx::query(
            r#"
            SELECT current_number, version, updated_at
            FROM document_sequences
            WHERE tenant_id = $1 AND document_type = $2
            "#,
        )
        .bind(key.tenant_id.as_str())
        .bind(key.document_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(SequenceRow {
            current_number: row.try_get("current_number")?,
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn compare_and_swap(
        &self,
        key: &SequenceKey,
        expected: Version,
        new_number: i64,
        new_version: Version,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE document_sequences
            SET current_number = $1, version = $2, updated_at = NOW()
            WHERE tenant_id = $3 AND document_type = $4 AND version = $5
            "#,
        )
        .bind(new_number)
        .bind(new_version.as_i64())
        .bind(key.tenant_id.as_str())
        .bind(key.document_type.as_str())
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn provision(&self, key: &SequenceKey, start: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO document_sequences (tenant_id, document_type, current_number, version)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, document_type) DO NOTHING
            "#,
        )
        .bind(key.tenant_id.as_str())
        .bind(key.document_type.as_str())
        .bind(start)
        .bind(Version::initial().as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
