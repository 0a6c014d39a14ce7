//! Database models for discount coupons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{CouponId, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "coupon_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CouponType {
    /// `value` is a percentage of the order amount
    Percentage,
    /// `value` is a fixed amount in BRL
    Fixed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub min_purchase_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CouponCreateDBRequest {
    pub code: String,
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub min_purchase_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub active: bool,
}

/// `Option<Option<_>>` fields distinguish "leave unchanged" from "clear".
#[derive(Debug, Clone, Default)]
pub struct CouponUpdateDBRequest {
    pub value: Option<Decimal>,
    pub min_purchase_amount: Option<Option<Decimal>>,
    pub max_uses: Option<Option<i32>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub product_id: Option<Option<ProductId>>,
    pub active: Option<bool>,
}
