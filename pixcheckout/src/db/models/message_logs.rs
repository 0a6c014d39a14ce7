//! Delivery logs for outbound email and WhatsApp messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct EmailLog {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub to: String,
    pub template: String,
    pub data: serde_json::Value,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct WhatsAppLog {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub to_phone: String,
    pub template: String,
    pub data: serde_json::Value,
    pub status: String,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageLogCreateDBRequest {
    pub to: String,
    pub template: String,
    pub data: serde_json::Value,
    pub status: DeliveryStatus,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageLogFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<DeliveryStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Substring match on the recipient
    pub recipient: Option<String>,
}
