//! API request and response models.
//!
//! Resources whose database rows carry money amounts or formatted fields get their own response
//! types here. Log and configuration rows are returned as their database models, which already
//! derive `Serialize` and `ToSchema`.

pub mod analytics;
pub mod audit_logs;
pub mod auth;
pub mod automation;
pub mod backups;
pub mod coupons;
pub mod customers;
pub mod files;
pub mod jobs;
pub mod messaging;
pub mod notifications;
pub mod orders;
pub mod pagination;
pub mod payment_links;
pub mod products;
pub mod reports;
pub mod security;
pub mod users;
