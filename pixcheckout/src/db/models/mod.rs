//! Database record models matching table schemas.
//!
//! Each struct here corresponds to a table row and derives `sqlx::FromRow`. Request structs
//! (`*CreateDBRequest`, `*UpdateDBRequest`) carry the data repositories need for writes.
//! API-facing shapes live in [`crate::api::models`] and convert from these.
//!
//! # Model Categories
//!
//! ## Storefront
//!
//! - [`products`], [`customers`], [`orders`], [`coupons`], [`payment_links`]
//!
//! ## Messaging and auditing
//!
//! - [`notifications`], [`audit_logs`], [`message_logs`]
//!
//! ## Administration
//!
//! - [`users`], [`settings`], [`security`], [`reports`], [`files`], [`backups`],
//!   [`analytics`], [`automation`]

pub mod analytics;
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
pub mod security;
pub mod settings;
pub mod users;
