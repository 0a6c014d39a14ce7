//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or a transaction) and
//! exposes strongly-typed queries over one table or a small group of related tables.
//! Repositories with plain CRUD semantics implement the [`Repository`] trait; the rest expose
//! inherent methods.
//!
//! # Available Repositories
//!
//! - [`Users`]: Admin accounts
//! - [`Products`], [`Customers`], [`Orders`], [`Coupons`], [`PaymentLinks`]: Storefront
//! - [`Notifications`], [`AuditLogs`], [`EmailLogs`], [`WhatsAppLogs`]: Messaging and audit
//! - [`Settings`]: The single settings row
//! - [`BlockedIps`], [`LoginAttempts`]: Checkout and login protection
//! - [`ReportSchedules`], [`ReportLogs`]: Scheduled reports
//! - [`Files`], [`Backups`]: Stored files and backup history
//! - [`Workflows`], [`Rules`], [`Executions`]: Automation
//! - [`analytics`]: Aggregation queries (free functions over a pool)
//! - [`analytics_records`]: Tracked events, metrics, predictions and dashboards
//! - [`file_storage`]: Object storage backends (filesystem, not postgres)
//!
//! # Common Pattern
//!
//! ```ignore
//! use pixcheckout::db::handlers::{Orders, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let expired = Orders::new(&mut tx).expire_overdue().await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod analytics_records;
pub mod audit_logs;
pub mod automation;
pub mod backups;
pub mod coupons;
pub mod customers;
pub mod file_storage;
pub mod files;
pub mod message_logs;
pub mod notifications;
pub mod orders;
pub mod payment_links;
pub mod products;
pub mod reports;
pub mod repository;
pub mod security;
pub mod settings;
pub mod users;

pub use audit_logs::AuditLogs;
pub use automation::{Executions, Rules, Workflows};
pub use backups::Backups;
pub use coupons::Coupons;
pub use customers::Customers;
pub use files::Files;
pub use message_logs::{EmailLogs, WhatsAppLogs};
pub use notifications::Notifications;
pub use orders::Orders;
pub use payment_links::PaymentLinks;
pub use products::Products;
pub use reports::{ReportLogs, ReportSchedules};
pub use repository::Repository;
pub use security::{BlockedIps, LoginAttempts};
pub use settings::Settings;
pub use users::Users;
