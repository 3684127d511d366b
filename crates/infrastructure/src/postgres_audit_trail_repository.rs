use async_trait::async_trait;
use sqlx::PgPool;

use vestigia_application::{AuditRecord, AuditTrailRepository};
use vestigia_core::{AppError, AppResult};


/// PostgreSQL-backed append-only audit trail.
#[derive(Clone)]
pub struct PostgresAuditTrailRepository {
    pool: PgPool,
}

impl PostgresAuditTrailRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditTrailRepository for PostgresAuditTrailRepository {
    async fn append_record(&self, record: AuditRecord) -> AppResult<()> {
        let actor = serde_json::to_value(&record.user)
            .map_err(|error| AppError::Internal(format!("failed to encode audit actor: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO audit_records (
                collection,
                action,
                endpoint,
                actor,
                old_value,
                new_value,
                created_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.collection)
        .bind(record.action.as_str())
        .bind(record.endpoint)
        .bind(actor)
        .bind(record.old_value)
        .bind(record.new_value)
        .bind(record.created_on)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit record: {error}")))?;

        Ok(())
    }
}
