//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which abstracts Pix charge creation and
//! webhook authentication across providers. [`primepag`] talks to the PrimePag gateway;
//! [`mock`] returns a fixed charge and is used when no gateway token is configured.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::time::Duration;

use crate::config::PaymentConfig;
use crate::db::models::settings::PaymentSettings;
use crate::types::OrderId;
use crate::webhooks::signing;

pub mod mock;
pub mod primepag;

/// Header carrying the hex HMAC-SHA256 of the raw webhook body.
pub const SIGNATURE_HEADER: &str = "x-primepag-signature";

/// Create a payment provider from runtime settings
///
/// This is the single point where we convert settings into provider instances.
/// A configured gateway token selects PrimePag; otherwise the mock provider is used.
pub fn create_provider(settings: &PaymentSettings, config: &PaymentConfig) -> Box<dyn PaymentProvider> {
    match settings.primepag_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            let api_url = settings
                .primepag_api_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .unwrap_or(config.primepag_api_url.as_str());
            Box::new(primepag::PrimePagProvider::new(
                api_url,
                token,
                settings.webhook_secret.clone(),
                config.request_timeout,
            ))
        }
        None => Box::new(mock::MockProvider::new(settings.webhook_secret.clone())),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,
}

impl From<PaymentError> for StatusCode {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidData(_) | PaymentError::MissingSignature | PaymentError::InvalidSignature => StatusCode::BAD_REQUEST,
            PaymentError::ProviderApi(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::ProviderApi(err.to_string())
    }
}

/// Customer identification sent with a charge
#[derive(Debug, Clone, Serialize)]
pub struct ChargeCustomer {
    pub name: String,
    pub email: String,
    pub document: String,
}

/// A Pix charge to create for an order
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    /// Amount in reais
    pub amount: Decimal,
    pub description: String,
    pub customer: ChargeCustomer,
    /// How long the charge stays payable
    pub expires_in: Duration,
    /// Where the gateway posts payment updates
    pub callback_url: String,
}

impl ChargeRequest {
    /// Amount in centavos, as the gateway expects.
    pub fn amount_cents(&self) -> Result<i64> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| PaymentError::InvalidData(format!("Amount out of range: {}", self.amount)))
    }
}

/// A created charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    /// Gateway charge id, if the provider assigns one
    pub id: Option<String>,
    /// QR code image, usually a data URI
    pub qr_code: String,
    /// Pix copy-and-paste (BR Code) string
    pub payment_code: String,
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Create a Pix charge for an order
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge>;

    /// Shared secret used to sign webhook bodies, if configured
    fn webhook_secret(&self) -> Option<&str>;

    /// Authenticate a webhook delivery from its headers and raw body
    ///
    /// Fails closed: without a configured secret every signature is rejected.
    fn verify_signature(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .ok_or(PaymentError::MissingSignature)?
            .to_str()
            .map_err(|_| PaymentError::InvalidSignature)?;

        let secret = self.webhook_secret().ok_or_else(|| {
            tracing::warn!("Webhook received but no webhook secret is configured");
            PaymentError::InvalidSignature
        })?;

        if signing::verify_signature(secret, body, signature) {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }
}

/// Create a charge, falling back to the mock charge when the gateway fails.
pub async fn create_charge_with_fallback(provider: &dyn PaymentProvider, request: &ChargeRequest) -> Charge {
    match provider.create_charge(request).await {
        Ok(charge) => charge,
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                order_id = %request.order_id,
                error = %e,
                "Charge creation failed, falling back to mock payment data"
            );
            mock::mock_charge()
        }
    }
}
