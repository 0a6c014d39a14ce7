//! Product payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::products::{Product, ProductCreateDBRequest, ProductType, ProductUpdateDBRequest},
    types::ProductId,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProductId,
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "97.00")]
    pub price: Decimal,
    pub image_url: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            image_url: p.image_url,
            product_type: p.product_type,
            active: p.active,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "97.00")]
    pub price: Decimal,
    #[serde(default)]
    pub image_url: String,
    #[serde(rename = "type", default = "default_product_type")]
    pub product_type: ProductType,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_product_type() -> ProductType {
    ProductType::Product
}

fn default_active() -> bool {
    true
}

impl From<ProductCreate> for ProductCreateDBRequest {
    fn from(c: ProductCreate) -> Self {
        Self {
            name: c.name,
            description: c.description,
            price: c.price,
            image_url: c.image_url,
            product_type: c.product_type,
            active: c.active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<ProductType>,
    pub active: Option<bool>,
}

impl From<ProductUpdate> for ProductUpdateDBRequest {
    fn from(u: ProductUpdate) -> Self {
        Self {
            name: u.name,
            description: u.description,
            price: u.price,
            image_url: u.image_url,
            product_type: u.product_type,
            active: u.active,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListProductsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Only list active products
    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub active_only: bool,
}
