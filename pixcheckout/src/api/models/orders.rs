//! Order and checkout payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::orders::{Order, OrderDetails, OrderStatus, OrderUpdateRecord},
    types::{CouponId, CustomerId, OrderId, ProductId},
    validation::CheckoutForm,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrderId,
    #[schema(value_type = String, format = "uuid")]
    pub customer_id: CustomerId,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    pub status: OrderStatus,
    pub payment_qr_code: String,
    pub payment_code: String,
    pub expires_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    #[schema(value_type = String)]
    pub discount_amount: Decimal,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub coupon_id: Option<CouponId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub customer_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product_name: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            customer_id: o.customer_id,
            product_id: o.product_id,
            status: o.status,
            payment_qr_code: o.payment_qr_code,
            payment_code: o.payment_code,
            expires_at: o.expires_at,
            total_amount: o.total_amount,
            discount_amount: o.discount_amount,
            coupon_id: o.coupon_id,
            paid_at: o.paid_at,
            transaction_id: o.transaction_id,
            payment_method: o.payment_method,
            created_at: o.created_at,
            updated_at: o.updated_at,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            product_name: None,
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(d: OrderDetails) -> Self {
        Self {
            customer_name: Some(d.customer_name),
            customer_email: Some(d.customer_email),
            customer_phone: Some(d.customer_phone),
            product_name: Some(d.product_name),
            ..Self::from(d.order)
        }
    }
}

/// What the checkout page polls while waiting for payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrderId,
    pub status: OrderStatus,
    pub expires_at: DateTime<Utc>,
    pub payment_qr_code: String,
    pub payment_code: String,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderStatusResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            status: o.status,
            expires_at: o.expires_at,
            payment_qr_code: o.payment_qr_code,
            payment_code: o.payment_code,
            total_amount: o.total_amount,
            paid_at: o.paid_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderHistoryEntry {
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<OrderUpdateRecord> for OrderHistoryEntry {
    fn from(r: OrderUpdateRecord) -> Self {
        Self {
            status: r.status,
            created_at: r.created_at,
        }
    }
}

/// Order with its status history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub history: Vec<OrderHistoryEntry>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListOrdersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub status: Option<OrderStatus>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub customer_id: Option<CustomerId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub product_id: Option<ProductId>,
    /// Created at or after this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Created before this instant
    pub end_date: Option<DateTime<Utc>>,
    /// Customer name or email contains
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Public checkout submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutCreate {
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    pub name: String,
    pub email: String,
    /// CPF or CNPJ, formatted or digits only
    #[serde(alias = "document")]
    pub cpf: String,
    pub phone: String,
    pub coupon_code: Option<String>,
}

impl CheckoutCreate {
    pub fn form(&self) -> CheckoutForm {
        CheckoutForm {
            name: self.name.clone(),
            email: self.email.clone(),
            document: self.cpf.clone(),
            phone: self.phone.clone(),
        }
    }
}
