//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (OrderId, ProductId, etc.)
//! - Resource and operation enums naming what an admin route does
//!
//! # Access Control
//!
//! - [`Resource`]: What entity type is being accessed (Orders, Products, Settings, etc.)
//! - [`Operation`]: What action is being performed (Read, Create, Update, Delete)
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

pub type UserId = Uuid;
pub type CustomerId = Uuid;
pub type ProductId = Uuid;
pub type OrderId = Uuid;
pub type CouponId = Uuid;
pub type NotificationId = Uuid;
pub type PaymentLinkId = Uuid;
pub type BlockedIpId = Uuid;
pub type ReportScheduleId = Uuid;
pub type FileId = Uuid;
pub type DashboardId = Uuid;
pub type WorkflowId = Uuid;
pub type RuleId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    ReadAll,
    UpdateAll,
    DeleteAll,
    /// Operational actions such as triggering jobs or restoring backups
    SystemAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Products,
    Orders,
    Customers,
    Coupons,
    Notifications,
    AuditLogs,
    Settings,
    Messaging,
    Reports,
    Analytics,
    Automation,
    Files,
    Backups,
    PaymentLinks,
    Security,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll => write!(f, "Create"),
            Operation::ReadAll => write!(f, "Read"),
            Operation::UpdateAll => write!(f, "Update"),
            Operation::DeleteAll => write!(f, "Delete"),
            Operation::SystemAccess => write!(f, "Access"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Products => "products",
            Resource::Orders => "orders",
            Resource::Customers => "customers",
            Resource::Coupons => "coupons",
            Resource::Notifications => "notifications",
            Resource::AuditLogs => "audit logs",
            Resource::Settings => "settings",
            Resource::Messaging => "messaging",
            Resource::Reports => "reports",
            Resource::Analytics => "analytics",
            Resource::Automation => "automation",
            Resource::Files => "files",
            Resource::Backups => "backups",
            Resource::PaymentLinks => "payment links",
            Resource::Security => "security",
        };
        f.write_str(name)
    }
}
