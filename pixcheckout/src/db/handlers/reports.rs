//! Database repositories for report schedules and their run log.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::reports::{ReportLog, ReportLogCreateDBRequest, ReportSchedule, ReportScheduleCreateDBRequest, ReportScheduleUpdateDBRequest},
};
use crate::types::{ReportScheduleId, abbrev_uuid};

#[derive(Debug, Clone)]
pub struct ReportScheduleFilter {
    pub skip: i64,
    pub limit: i64,
}

impl ReportScheduleFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct ReportSchedules<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ReportSchedules<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Active schedules whose next run is at or before `now`.
    #[instrument(skip(self), err)]
    pub async fn due(&mut self, now: DateTime<Utc>) -> Result<Vec<ReportSchedule>> {
        let schedules = sqlx::query_as::<_, ReportSchedule>(
            "SELECT * FROM report_schedules WHERE active AND next_run <= $1 ORDER BY next_run ASC",
        )
        .bind(now)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(schedules)
    }

    #[instrument(skip(self), fields(schedule_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_run(&mut self, id: ReportScheduleId, last_run: DateTime<Utc>, next_run: DateTime<Utc>) -> Result<ReportSchedule> {
        let schedule = sqlx::query_as::<_, ReportSchedule>(
            "UPDATE report_schedules SET last_run = $2, next_run = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(last_run)
        .bind(next_run)
        .fetch_optional(&mut *self.db)
        .await?;

        schedule.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM report_schedules")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for ReportSchedules<'c> {
    type CreateRequest = ReportScheduleCreateDBRequest;
    type UpdateRequest = ReportScheduleUpdateDBRequest;
    type Response = ReportSchedule;
    type Id = ReportScheduleId;
    type Filter = ReportScheduleFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let schedule = sqlx::query_as::<_, ReportSchedule>(
            r#"
            INSERT INTO report_schedules (id, name, report_type, format, frequency, recipients, active, next_run)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.report_type.as_str())
        .bind(request.format.as_str())
        .bind(request.frequency.as_str())
        .bind(&request.recipients)
        .bind(request.active)
        .bind(request.next_run)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(schedule)
    }

    #[instrument(skip(self), fields(schedule_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let schedule = sqlx::query_as::<_, ReportSchedule>("SELECT * FROM report_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(schedule)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let schedules = sqlx::query_as::<_, ReportSchedule>("SELECT * FROM report_schedules ORDER BY created_at DESC OFFSET $1 LIMIT $2")
            .bind(filter.skip)
            .bind(filter.limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(schedules)
    }

    #[instrument(skip(self), fields(schedule_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM report_schedules WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(schedule_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let schedule = sqlx::query_as::<_, ReportSchedule>(
            r#"
            UPDATE report_schedules
            SET
                name = COALESCE($2, name),
                format = COALESCE($3, format),
                frequency = COALESCE($4, frequency),
                recipients = COALESCE($5, recipients),
                active = COALESCE($6, active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.format.map(|f| f.as_str()))
        .bind(request.frequency.map(|f| f.as_str()))
        .bind(&request.recipients)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        schedule.ok_or(DbError::NotFound)
    }
}

pub struct ReportLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ReportLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(schedule_id = %abbrev_uuid(&request.schedule_id), success = request.success), err)]
    pub async fn create(&mut self, request: &ReportLogCreateDBRequest) -> Result<ReportLog> {
        let log = sqlx::query_as::<_, ReportLog>(
            r#"
            INSERT INTO report_logs (id, schedule_id, status, recipients, file_url, metadata, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.schedule_id)
        .bind(if request.success { "success" } else { "failed" })
        .bind(&request.recipients)
        .bind(&request.file_url)
        .bind(&request.metadata)
        .bind(&request.error)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, schedule_id: Option<ReportScheduleId>, skip: i64, limit: i64) -> Result<Vec<ReportLog>> {
        let logs = sqlx::query_as::<_, ReportLog>(
            r#"
            SELECT * FROM report_logs
            WHERE ($1::uuid IS NULL OR schedule_id = $1)
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(schedule_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::reports::{ReportFormat, ReportFrequency, ReportType};
    use chrono::Duration;
    use sqlx::PgPool;

    fn schedule(name: &str, next_run: DateTime<Utc>, active: bool) -> ReportScheduleCreateDBRequest {
        ReportScheduleCreateDBRequest {
            name: name.to_string(),
            report_type: ReportType::Sales,
            format: ReportFormat::Csv,
            frequency: ReportFrequency::Daily,
            recipients: vec!["ops@example.com".to_string()],
            active,
            next_run,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_due_schedules(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ReportSchedules::new(&mut conn);
        let now = Utc::now();

        let due = repo.create(&schedule("due", now - Duration::minutes(1), true)).await.unwrap();
        repo.create(&schedule("later", now + Duration::hours(1), true)).await.unwrap();
        repo.create(&schedule("inactive", now - Duration::minutes(1), false)).await.unwrap();

        let found = repo.due(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
        assert_eq!(found[0].report_type, "sales");

        let next = ReportFrequency::Daily.next_run(now);
        let ran = repo.mark_run(due.id, now, next).await.unwrap();
        assert!(ran.last_run.is_some());
        assert!(repo.due(now).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_logs(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let created = ReportSchedules::new(&mut conn)
            .create(&schedule("weekly", Utc::now(), true))
            .await
            .unwrap();

        let updated = ReportSchedules::new(&mut conn)
            .update(
                created.id,
                &ReportScheduleUpdateDBRequest {
                    frequency: Some(ReportFrequency::Weekly),
                    format: Some(ReportFormat::Html),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.frequency, "weekly");
        assert_eq!(updated.format, "html");
        assert_eq!(updated.name, "weekly");

        let mut logs = ReportLogs::new(&mut conn);
        logs.create(&ReportLogCreateDBRequest {
            schedule_id: created.id,
            success: false,
            recipients: vec![],
            file_url: None,
            metadata: serde_json::json!({}),
            error: Some("boom".to_string()),
        })
        .await
        .unwrap();
        let listed = logs.list(Some(created.id), 0, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, "failed");
    }
}
