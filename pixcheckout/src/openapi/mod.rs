//! OpenAPI documentation.
//!
//! [`ApiDoc`] combines three surfaces into one document served at `/admin/docs`:
//! - [`StorefrontApiDoc`]: public checkout endpoints at `/api/v1/*`
//! - [`AdminApiDoc`]: management API at `/admin/api/v1/*`
//! - authentication and the payment gateway webhook at the root

pub mod admin;
pub mod storefront;

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

pub use admin::AdminApiDoc;
pub use storefront::StorefrontApiDoc;

use crate::api::handlers;

/// Bearer token and session cookie schemes used by the admin API.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "BearerAuth".to_string(),
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "Session token returned by `POST /authentication/login`:\n\n\
                         ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                    ))
                    .build(),
            ),
        );
        components.security_schemes.insert(
            "CookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "pixcheckout_session",
                "Session cookie set by `POST /authentication/login`",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pix Checkout API",
        description = "Storefront checkout with Pix payments, plus the admin API behind the dashboard."
    ),
    nest(
        (path = "/api/v1", api = StorefrontApiDoc),
        (path = "/admin/api/v1", api = AdminApiDoc),
    ),
    paths(
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::webhooks::primepag_webhook,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Admin login and session management"),
        (name = "webhooks", description = "Charge updates pushed by the payment gateway"),
    )
)]
pub struct ApiDoc;
