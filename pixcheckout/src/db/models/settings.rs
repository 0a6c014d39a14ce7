//! Database model for the single-row `settings` table.
//!
//! The three JSON columns are typed here; secrets are stored encrypted (see
//! [`crate::crypto`]) and decrypted by [`crate::settings`] on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow)]
pub struct SettingsRow {
    pub payment_settings: serde_json::Value,
    pub whatsapp_settings: serde_json::Value,
    pub notification_settings: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Payment gateway credentials and behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PaymentSettings {
    /// PrimePag API token. When unset, charges are generated by the mock provider.
    pub primepag_token: Option<String>,
    /// Overrides `payment.primepag_api_url` from the service configuration
    pub primepag_api_url: Option<String>,
    /// Shared secret used to verify `x-primepag-signature`
    pub webhook_secret: Option<String>,
    /// Charge expiration in minutes; falls back to `checkout.order_expiry`
    pub auto_expire_time: Option<u32>,
}

/// WhatsApp gateway credentials and message templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WhatsAppSettings {
    pub enabled: bool,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub instance_id: Option<String>,
    /// Template name to message text with `{placeholder}` fields
    pub templates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NotificationSettings {
    /// Send transactional emails to customers
    pub email_enabled: bool,
    /// Carbon copy for order confirmations
    pub send_copy_to: Option<String>,
    /// Recipients of the daily summary email
    pub daily_summary_recipients: Vec<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_enabled: true,
            send_copy_to: None,
            daily_summary_recipients: Vec::new(),
        }
    }
}
