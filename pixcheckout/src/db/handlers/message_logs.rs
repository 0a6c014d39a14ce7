//! Database repositories for outbound message delivery logs.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::message_logs::{EmailLog, MessageLogCreateDBRequest, MessageLogFilter, WhatsAppLog},
};

pub struct EmailLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> EmailLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(template = %request.template, status = request.status.as_str()), err)]
    pub async fn create(&mut self, request: &MessageLogCreateDBRequest) -> Result<EmailLog> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            INSERT INTO email_logs (id, "to", template, data, status, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.to)
        .bind(&request.template)
        .bind(&request.data)
        .bind(request.status.as_str())
        .bind(&request.error)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &MessageLogFilter) -> Result<Vec<EmailLog>> {
        let logs = sqlx::query_as::<_, EmailLog>(
            r#"
            SELECT * FROM email_logs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND ($4::text IS NULL OR "to" ILIKE '%' || $4 || '%')
            ORDER BY created_at DESC
            OFFSET $5 LIMIT $6
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.recipient.as_deref())
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &MessageLogFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM email_logs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND ($4::text IS NULL OR "to" ILIKE '%' || $4 || '%')
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.recipient.as_deref())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}

pub struct WhatsAppLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> WhatsAppLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(template = %request.template, status = request.status.as_str()), err)]
    pub async fn create(&mut self, request: &MessageLogCreateDBRequest) -> Result<WhatsAppLog> {
        let log = sqlx::query_as::<_, WhatsAppLog>(
            r#"
            INSERT INTO whatsapp_logs (id, to_phone, template, data, status, message_id, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.to)
        .bind(&request.template)
        .bind(&request.data)
        .bind(request.status.as_str())
        .bind(&request.message_id)
        .bind(&request.error)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &MessageLogFilter) -> Result<Vec<WhatsAppLog>> {
        let logs = sqlx::query_as::<_, WhatsAppLog>(
            r#"
            SELECT * FROM whatsapp_logs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND ($4::text IS NULL OR to_phone ILIKE '%' || $4 || '%')
            ORDER BY created_at DESC
            OFFSET $5 LIMIT $6
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.recipient.as_deref())
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &MessageLogFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM whatsapp_logs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND ($4::text IS NULL OR to_phone ILIKE '%' || $4 || '%')
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.recipient.as_deref())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Failed deliveries created at or after `since`, oldest first.
    #[instrument(skip(self), err)]
    pub async fn failed_since(&mut self, since: DateTime<Utc>) -> Result<Vec<WhatsAppLog>> {
        let logs = sqlx::query_as::<_, WhatsAppLog>(
            "SELECT * FROM whatsapp_logs WHERE status = 'failed' AND created_at >= $1 ORDER BY created_at ASC",
        )
        .bind(since)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::message_logs::DeliveryStatus;
    use chrono::Duration;
    use sqlx::PgPool;

    fn log(to: &str, status: DeliveryStatus) -> MessageLogCreateDBRequest {
        MessageLogCreateDBRequest {
            to: to.to_string(),
            template: "payment_received".to_string(),
            data: serde_json::json!({"order_id": "abc"}),
            status,
            message_id: None,
            error: (status == DeliveryStatus::Failed).then(|| "timeout".to_string()),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_whatsapp_failed_since(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = WhatsAppLogs::new(&mut conn);

        repo.create(&log("5511999990000", DeliveryStatus::Sent)).await.unwrap();
        let failed = repo.create(&log("5511999990001", DeliveryStatus::Failed)).await.unwrap();
        let old = repo.create(&log("5511999990002", DeliveryStatus::Failed)).await.unwrap();
        sqlx::query("UPDATE whatsapp_logs SET created_at = NOW() - INTERVAL '2 days' WHERE id = $1")
            .bind(old.id)
            .execute(&mut *repo.db)
            .await
            .unwrap();

        let recent = repo.failed_since(Utc::now() - Duration::hours(24)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, failed.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_email_log_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = EmailLogs::new(&mut conn);

        repo.create(&log("ana@example.com", DeliveryStatus::Sent)).await.unwrap();
        repo.create(&log("bruno@example.com", DeliveryStatus::Failed)).await.unwrap();

        let failed = MessageLogFilter {
            limit: 10,
            status: Some(DeliveryStatus::Failed),
            ..Default::default()
        };
        let listed = repo.list(&failed).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].to, "bruno@example.com");

        let by_recipient = MessageLogFilter {
            limit: 10,
            recipient: Some("ANA".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&by_recipient).await.unwrap().len(), 1);
    }
}
