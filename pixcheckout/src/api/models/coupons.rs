//! Coupon payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::coupons::{Coupon, CouponCreateDBRequest, CouponType, CouponUpdateDBRequest},
    types::{CouponId, ProductId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CouponId,
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    #[schema(value_type = String)]
    pub value: Decimal,
    #[schema(value_type = Option<String>)]
    pub min_purchase_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub product_id: Option<ProductId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Coupon> for CouponResponse {
    fn from(c: Coupon) -> Self {
        Self {
            id: c.id,
            code: c.code,
            coupon_type: c.coupon_type,
            value: c.value,
            min_purchase_amount: c.min_purchase_amount,
            max_uses: c.max_uses,
            current_uses: c.current_uses,
            expires_at: c.expires_at,
            product_id: c.product_id,
            active: c.active,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponCreate {
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    #[schema(value_type = String)]
    pub value: Decimal,
    #[schema(value_type = Option<String>)]
    pub min_purchase_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub product_id: Option<ProductId>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl From<CouponCreate> for CouponCreateDBRequest {
    fn from(c: CouponCreate) -> Self {
        Self {
            code: c.code.trim().to_uppercase(),
            coupon_type: c.coupon_type,
            value: c.value,
            min_purchase_amount: c.min_purchase_amount,
            max_uses: c.max_uses,
            expires_at: c.expires_at,
            product_id: c.product_id,
            active: c.active,
        }
    }
}

/// Partial update. For the nullable fields, an explicit `null` clears the value and an absent
/// field leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CouponUpdate {
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub min_purchase_amount: Option<Option<Decimal>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub max_uses: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub product_id: Option<Option<ProductId>>,
    pub active: Option<bool>,
}

impl From<CouponUpdate> for CouponUpdateDBRequest {
    fn from(u: CouponUpdate) -> Self {
        Self {
            value: u.value,
            min_purchase_amount: u.min_purchase_amount,
            max_uses: u.max_uses,
            expires_at: u.expires_at,
            product_id: u.product_id,
            active: u.active,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCouponsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub active_only: bool,
}

/// Preview a coupon against a product before checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponValidateRequest {
    pub code: String,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponValidateResponse {
    pub valid: bool,
    pub message: Option<String>,
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub final_amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub coupon_type: Option<CouponType>,
}
