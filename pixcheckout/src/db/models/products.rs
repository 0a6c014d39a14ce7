//! Database models for products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "product_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Product,
    Service,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Service => "service",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProductCreateDBRequest {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: String,
    pub product_type: ProductType,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub product_type: Option<ProductType>,
    pub active: Option<bool>,
}
