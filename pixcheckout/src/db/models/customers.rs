//! Database models for customers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::CustomerId;

/// A buyer, identified by email. Name, phone and document are refreshed on every checkout.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    /// Digits-only CPF or CNPJ
    pub cpf: String,
    /// Digits-only phone number
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CustomerUpsertDBRequest {
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub phone: String,
}
