//! Email and WhatsApp send requests and log queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::message_logs::{DeliveryStatus, MessageLogFilter},
};

/// Fields are optional so that a missing one is reported as a 400 with a message rather than
/// a JSON rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmailSendRequest {
    pub to: Option<String>,
    /// Template name, e.g. `order_confirmation`
    pub template: Option<String>,
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub cc: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WhatsAppSendRequest {
    pub to: Option<String>,
    pub template: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListMessageLogsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>)]
    pub status: Option<DeliveryStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Recipient contains
    pub recipient: Option<String>,
}

impl ListMessageLogsQuery {
    pub fn filter(self) -> MessageLogFilter {
        let (skip, limit) = self.pagination.params();
        MessageLogFilter {
            skip,
            limit,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            recipient: self.recipient.filter(|r| !r.trim().is_empty()),
        }
    }
}
