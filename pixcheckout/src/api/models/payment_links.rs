use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    config::Config,
    db::models::payment_links::PaymentLink,
    types::ProductId,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentLinkCreate {
    #[schema(value_type = String, format = "uuid")]
    pub product_id: ProductId,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentLinkResponse {
    #[serde(flatten)]
    pub link: PaymentLink,
    /// Public URL resolving the link to its product
    pub url: String,
}

impl PaymentLinkResponse {
    pub fn new(link: PaymentLink, config: &Config) -> Self {
        let url = format!(
            "{}/api/v1/payment-links/{}",
            config.public_url.as_str().trim_end_matches('/'),
            link.url_token
        );
        Self { link, url }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListPaymentLinksQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub product_id: Option<ProductId>,
}
