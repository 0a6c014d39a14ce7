//! Database repositories for blocked addresses and admin login attempts.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::security::{BlockedIp, BlockedIpCreateDBRequest, LoginAttempt},
};
use crate::types::{BlockedIpId, abbrev_uuid};

pub struct BlockedIps<'c> {
    db: &'c mut PgConnection,
}

impl<'c> BlockedIps<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(ip = %request.ip_address), err)]
    pub async fn block(&mut self, request: &BlockedIpCreateDBRequest) -> Result<BlockedIp> {
        let blocked = sqlx::query_as::<_, BlockedIp>(
            r#"
            INSERT INTO blocked_ips (id, ip_address, reason, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.ip_address)
        .bind(&request.reason)
        .bind(request.expires_at)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(blocked)
    }

    /// Deactivate a block. Returns false if it does not exist.
    #[instrument(skip(self), fields(block_id = %abbrev_uuid(&id)), err)]
    pub async fn unblock(&mut self, id: BlockedIpId) -> Result<bool> {
        let result = sqlx::query("UPDATE blocked_ips SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    pub async fn is_blocked(&mut self, ip: &str) -> Result<bool> {
        let blocked = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM blocked_ips
                WHERE ip_address = $1 AND active AND (expires_at IS NULL OR expires_at > NOW())
            )
            "#,
        )
        .bind(ip)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(blocked)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, active_only: bool, skip: i64, limit: i64) -> Result<Vec<BlockedIp>> {
        let blocked = sqlx::query_as::<_, BlockedIp>(
            r#"
            SELECT * FROM blocked_ips
            WHERE (NOT $1 OR active)
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(active_only)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(blocked)
    }
}

pub struct LoginAttempts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> LoginAttempts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn record(&mut self, email: &str, ip_address: Option<&str>, success: bool) -> Result<()> {
        sqlx::query("INSERT INTO login_attempts (id, email, ip_address, success) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(ip_address)
            .bind(success)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, email: Option<&str>, skip: i64, limit: i64) -> Result<Vec<LoginAttempt>> {
        let attempts = sqlx::query_as::<_, LoginAttempt>(
            r#"
            SELECT * FROM login_attempts
            WHERE ($1::text IS NULL OR LOWER(email) = LOWER($1))
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(email)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(attempts)
    }
}
