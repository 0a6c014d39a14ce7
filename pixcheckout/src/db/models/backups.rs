//! Database models for backup and restore history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackupOperation {
    Backup,
    Restore,
}

impl BackupOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
        }
    }
}

/// Tables that can be included in a backup, in restore (insert) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackupTable {
    Products,
    Customers,
    Coupons,
    Orders,
    OrderUpdates,
    PaymentLinks,
    Settings,
    Files,
}

impl BackupTable {
    pub const ALL: [BackupTable; 8] = [
        Self::Products,
        Self::Customers,
        Self::Coupons,
        Self::Orders,
        Self::OrderUpdates,
        Self::PaymentLinks,
        Self::Settings,
        Self::Files,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Customers => "customers",
            Self::Coupons => "coupons",
            Self::Orders => "orders",
            Self::OrderUpdates => "order_updates",
            Self::PaymentLinks => "payment_links",
            Self::Settings => "settings",
            Self::Files => "files",
        }
    }

    /// Tables holding foreign keys to this one. Clearing this table deletes or nulls their
    /// references, so a restore must replace them too.
    pub fn dependents(&self) -> &'static [BackupTable] {
        match self {
            Self::Products => &[Self::Coupons, Self::Orders, Self::PaymentLinks],
            Self::Customers => &[Self::Orders],
            Self::Coupons => &[Self::Orders],
            Self::Orders => &[Self::OrderUpdates],
            Self::OrderUpdates | Self::PaymentLinks | Self::Settings | Self::Files => &[],
        }
    }
}

impl std::str::FromStr for BackupTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown backup table: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BackupLog {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub operation: String,
    pub status: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub tables: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BackupLogCreateDBRequest {
    pub operation: BackupOperation,
    pub success: bool,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub tables: Vec<String>,
    pub error: Option<String>,
}
