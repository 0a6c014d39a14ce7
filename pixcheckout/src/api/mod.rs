//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Storefront** (`/api/v1/*`): Public product page, checkout, order status, coupon preview
//!   and payment link resolution. No authentication.
//! - **Authentication** (`/authentication/*`): Admin login, logout and current session
//! - **Admin** (`/admin/api/v1/*`): Catalog, orders, customers, coupons, payment links,
//!   notifications, audit logs, settings, messaging, reports, analytics, automation, files,
//!   backups, security and maintenance jobs. Requires an admin session cookie or bearer token.
//! - **Webhooks** (`/webhooks/primepag`): Signed charge updates from the payment gateway
//!
//! # Errors
//!
//! Errors are returned as plain text with the matching status code (see
//! [`crate::errors::Error`]). The webhook endpoint answers with a JSON body instead.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. Interactive documentation is served
//! at `/admin/docs` and the raw document at `/admin/openapi.json`.

pub mod handlers;
pub mod models;
