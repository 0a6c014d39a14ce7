//! Authentication and authorization for the admin surface.
//!
//! Admins log in via `/authentication/login` with email and password and receive a JWT in an
//! HTTP-only session cookie. The same token is accepted as `Authorization: Bearer <token>`.
//!
//! # Modules
//!
//! - [`current_user`]: extractor resolving the caller from the cookie or bearer token
//! - [`password`]: Argon2 hashing and verification
//! - [`permissions`]: `RequiresPermission` extractor guarding admin routes
//! - [`session`]: JWT creation and verification
//!
//! ```ignore
//! use pixcheckout::auth::permissions::{operation, resource, RequiresPermission};
//!
//! async fn list_products(
//!     State(state): State<AppState>,
//!     _: RequiresPermission<resource::Products, operation::ReadAll>,
//! ) -> Result<Json<Vec<Product>>> { ... }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
