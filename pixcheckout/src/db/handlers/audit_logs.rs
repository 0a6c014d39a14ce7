//! Database repository for the audit trail.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::audit_logs::{AuditLog, AuditLogCreateDBRequest, AuditLogFilter},
};

pub struct AuditLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(table = %request.table_name, action = request.action.as_str()), err)]
    pub async fn create(&mut self, request: &AuditLogCreateDBRequest) -> Result<AuditLog> {
        let log = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (id, table_name, record_id, action, old_data, new_data, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.table_name)
        .bind(&request.record_id)
        .bind(request.action.as_str())
        .bind(&request.old_data)
        .bind(&request.new_data)
        .bind(request.user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::text IS NULL OR table_name = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::text IS NULL OR record_id = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(filter.table_name.as_deref())
        .bind(filter.action.map(|a| a.as_str()))
        .bind(filter.record_id.as_deref())
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AuditLogFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE ($1::text IS NULL OR table_name = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::text IS NULL OR record_id = $3)
            "#,
        )
        .bind(filter.table_name.as_deref())
        .bind(filter.action.map(|a| a.as_str()))
        .bind(filter.record_id.as_deref())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
