//! Database models for in-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{NotificationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderStatus,
    Payment,
    System,
    Automation,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderStatus => "order_status",
            Self::Payment => "payment",
            Self::System => "system",
            Self::Automation => "automation",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Notification {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    /// Recipient; `None` for broadcast notifications visible to every admin
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub content: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub user_id: Option<UserId>,
    pub notification_type: NotificationType,
    pub title: String,
    pub content: String,
    pub data: serde_json::Value,
}
