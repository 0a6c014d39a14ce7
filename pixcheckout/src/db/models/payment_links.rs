//! Database models for shareable payment links.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{PaymentLinkId, ProductId, UserId};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PaymentLink {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentLinkId,
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
    pub url_token: String,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct PaymentLinkCreateDBRequest {
    pub product_id: ProductId,
    pub url_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}
