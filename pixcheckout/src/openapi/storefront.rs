//! Public checkout endpoints, mounted at `/api/v1`. None of them require authentication.

use utoipa::OpenApi;

use crate::api::handlers::{checkout, products};

#[derive(OpenApi)]
#[openapi(
    paths(
        products::get_public_product,
        checkout::create_checkout,
        checkout::get_order_status,
        checkout::simulate_payment,
        checkout::validate_coupon_preview,
        checkout::resolve_payment_link,
    ),
    tags((name = "storefront", description = "Product page, checkout and order status polling"))
)]
pub struct StorefrontApiDoc;
