//! Customer payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::{orders::OrderResponse, pagination::Pagination},
    db::models::customers::Customer,
    types::CustomerId,
    validation::{format_document, format_phone},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    /// Formatted CPF (`000.000.000-00`) or CNPJ
    pub cpf: String,
    /// Formatted phone number
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            cpf: format_document(&c.cpf),
            phone: format_phone(&c.phone),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerDetailResponse {
    #[serde(flatten)]
    pub customer: CustomerResponse,
    pub orders: Vec<OrderResponse>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCustomersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Name, email or document contains
    pub search: Option<String>,
}
