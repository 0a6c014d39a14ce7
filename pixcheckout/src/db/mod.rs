//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, services)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Multi-statement writes (checkout, webhook processing, restores) run inside a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let order = Orders::new(&mut tx).create(&request).await?;
//! Coupons::new(&mut tx).increment_uses(coupon_id).await?;
//! tx.commit().await?;
//! ```
//!
//! Read-only access can use a pooled connection directly.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded with [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
