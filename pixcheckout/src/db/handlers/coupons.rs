//! Database repository for discount coupons.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::coupons::{Coupon, CouponCreateDBRequest, CouponUpdateDBRequest},
};
use crate::types::{CouponId, abbrev_uuid};

#[derive(Debug, Clone)]
pub struct CouponFilter {
    pub skip: i64,
    pub limit: i64,
    pub active_only: bool,
}

impl CouponFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            active_only: false,
        }
    }
}

pub struct Coupons<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Coupons<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a coupon by code. Codes are stored upper-case, so lookups are case-insensitive.
    #[instrument(skip(self), err)]
    pub async fn get_by_code(&mut self, code: &str) -> Result<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = UPPER($1)")
            .bind(code.trim())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(coupon)
    }

    /// Count one redemption if the coupon still has uses left. Returns `false` when `max_uses`
    /// is already reached. The check and the increment are one statement, so concurrent
    /// checkouts cannot overshoot the cap.
    #[instrument(skip(self), fields(coupon_id = %abbrev_uuid(&id)), err)]
    pub async fn increment_uses(&mut self, id: CouponId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons SET current_uses = current_uses + 1
            WHERE id = $1 AND (max_uses IS NULL OR current_uses < max_uses)
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(DbError::NotFound),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, active_only: bool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM coupons WHERE (NOT $1 OR active)")
            .bind(active_only)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Coupons<'c> {
    type CreateRequest = CouponCreateDBRequest;
    type UpdateRequest = CouponUpdateDBRequest;
    type Response = Coupon;
    type Id = CouponId;
    type Filter = CouponFilter;

    #[instrument(skip(self, request), fields(code = %request.code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            INSERT INTO coupons (id, code, type, value, min_purchase_amount, max_uses, expires_at, product_id, active)
            VALUES ($1, UPPER($2), $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.code.trim())
        .bind(request.coupon_type)
        .bind(request.value)
        .bind(request.min_purchase_amount)
        .bind(request.max_uses)
        .bind(request.expires_at)
        .bind(request.product_id)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(coupon)
    }

    #[instrument(skip(self), fields(coupon_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(coupon)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let coupons = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT * FROM coupons
            WHERE (NOT $3 OR active)
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(filter.skip)
        .bind(filter.limit)
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(coupons)
    }

    #[instrument(skip(self), fields(coupon_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(coupon_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            UPDATE coupons
            SET
                value = COALESCE($2, value),
                min_purchase_amount = CASE WHEN $3::boolean THEN $4 ELSE min_purchase_amount END,
                max_uses = CASE WHEN $5::boolean THEN $6 ELSE max_uses END,
                expires_at = CASE WHEN $7::boolean THEN $8 ELSE expires_at END,
                product_id = CASE WHEN $9::boolean THEN $10 ELSE product_id END,
                active = COALESCE($11, active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.value)
        .bind(request.min_purchase_amount.is_some())
        .bind(request.min_purchase_amount.flatten())
        .bind(request.max_uses.is_some())
        .bind(request.max_uses.flatten())
        .bind(request.expires_at.is_some())
        .bind(request.expires_at.flatten())
        .bind(request.product_id.is_some())
        .bind(request.product_id.flatten())
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        coupon.ok_or(DbError::NotFound)
    }
}
