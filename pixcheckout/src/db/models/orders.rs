//! Database models for orders and their status history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{CouponId, CustomerId, OrderId, ProductId};

/// Order lifecycle. Orders start `pending`, become `paid` or `expired` from the payment
/// webhook or the expiry sweeper, and can be `cancelled` by an admin while pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Paid,
    Expired,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Expired | Self::Cancelled | Self::Failed)
    }

    /// Whether an admin may move an order from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (a, b) if *a == b => false,
            (Self::Pending, _) => true,
            (Self::Processing, Self::Paid | Self::Failed | Self::Expired | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "paid" => Ok(Self::Paid),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown order status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub status: OrderStatus,
    pub payment_qr_code: String,
    pub payment_code: String,
    pub expires_at: DateTime<Utc>,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub coupon_id: Option<CouponId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order joined with its customer and product, for admin listings and emails.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub product_name: String,
}

#[derive(Debug, Clone)]
pub struct OrderCreateDBRequest {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub coupon_id: Option<CouponId>,
    pub expires_at: DateTime<Utc>,
}

/// Payment outcome reported by the gateway.
#[derive(Debug, Clone)]
pub struct OrderPaymentUpdate {
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: String,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive match on customer name or email
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderUpdateRecord {
    pub id: uuid::Uuid,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Paid,
            OrderStatus::Expired,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Expired.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Pending));
    }
}
