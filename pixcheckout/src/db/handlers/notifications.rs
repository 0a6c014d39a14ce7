//! Database repository for in-app notifications.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::notifications::{Notification, NotificationCreateDBRequest},
};
use crate::types::{NotificationId, UserId, abbrev_uuid};

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub skip: i64,
    pub limit: i64,
    /// Restrict to one recipient. Broadcast notifications (no recipient) always match.
    pub user_id: Option<UserId>,
    pub unread_only: bool,
}

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(kind = request.notification_type.as_str()), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, type, title, content, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.notification_type.as_str())
        .bind(&request.title)
        .bind(&request.content)
        .bind(&request.data)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(notification)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE ($1::uuid IS NULL OR user_id = $1 OR user_id IS NULL)
              AND (NOT $2 OR NOT read)
            ORDER BY created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.unread_only)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(notifications)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &NotificationFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE ($1::uuid IS NULL OR user_id = $1 OR user_id IS NULL)
              AND (NOT $2 OR NOT read)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.unread_only)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Mark one notification as read. With `user_id` set, notifications addressed to another user
    /// are treated as missing.
    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_read(&mut self, id: NotificationId, user_id: Option<UserId>) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET read = TRUE
            WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2 OR user_id IS NULL)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(notification)
    }

    /// Mark every unread notification visible to `user_id` as read. Returns how many changed.
    #[instrument(skip(self), err)]
    pub async fn mark_all_read(&mut self, user_id: Option<UserId>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read = TRUE
            WHERE NOT read AND ($1::uuid IS NULL OR user_id = $1 OR user_id IS NULL)
            "#,
        )
        .bind(user_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Same visibility rule as [`Self::mark_read`].
    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: NotificationId, user_id: Option<UserId>) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2 OR user_id IS NULL)")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::notifications::NotificationType;
    use sqlx::PgPool;

    fn notification(user_id: Option<UserId>, title: &str) -> NotificationCreateDBRequest {
        NotificationCreateDBRequest {
            user_id,
            notification_type: NotificationType::System,
            title: title.to_string(),
            content: "content".to_string(),
            data: serde_json::json!({}),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unread_filter_and_mark_all_read(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Notifications::new(&mut conn);
        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();

        let mine = repo.create(&notification(Some(me), "mine")).await.unwrap();
        repo.create(&notification(None, "broadcast")).await.unwrap();
        repo.create(&notification(Some(someone_else), "theirs")).await.unwrap();

        let filter = NotificationFilter {
            limit: 10,
            user_id: Some(me),
            unread_only: true,
            ..Default::default()
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let read = repo.mark_read(mine.id, Some(me)).await.unwrap().unwrap();
        assert!(read.read);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        assert_eq!(repo.mark_all_read(Some(me)).await.unwrap(), 1);
        assert_eq!(repo.count(&filter).await.unwrap(), 0);

        // The other user's notification is untouched.
        let all_unread = NotificationFilter {
            limit: 10,
            unread_only: true,
            ..Default::default()
        };
        assert_eq!(repo.count(&all_unread).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Notifications::new(&mut conn);

        let created = repo.create(&notification(None, "gone")).await.unwrap();
        assert!(repo.delete(created.id, None).await.unwrap());
        assert!(!repo.delete(created.id, None).await.unwrap());
        assert!(repo.mark_read(created.id, None).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_other_users_notifications_are_out_of_reach(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Notifications::new(&mut conn);
        let me = Uuid::new_v4();
        let owner = Uuid::new_v4();

        let theirs = repo.create(&notification(Some(owner), "theirs")).await.unwrap();
        assert!(repo.mark_read(theirs.id, Some(me)).await.unwrap().is_none());
        assert!(!repo.delete(theirs.id, Some(me)).await.unwrap());

        let read = repo.mark_read(theirs.id, Some(owner)).await.unwrap().unwrap();
        assert!(read.read);
        assert!(repo.delete(theirs.id, Some(owner)).await.unwrap());
    }
}
