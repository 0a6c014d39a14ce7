//! Mock payment provider
//!
//! Returns a fixed QR code and BR Code without contacting any gateway. Used when no PrimePag
//! token is configured and as the fallback when the gateway fails.

use async_trait::async_trait;

use crate::payment_providers::{Charge, ChargeRequest, PaymentProvider, Result};

/// 1x1 transparent PNG
pub const MOCK_QR_CODE: &str =
    "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";
pub const MOCK_PAYMENT_CODE: &str = "00020126580014BR.GOV.BCB.PIX0136123e4567-e89b-12d3-a456-426614174000";

pub fn mock_charge() -> Charge {
    Charge {
        id: None,
        qr_code: MOCK_QR_CODE.to_string(),
        payment_code: MOCK_PAYMENT_CODE.to_string(),
    }
}

pub struct MockProvider {
    webhook_secret: Option<String>,
}

impl MockProvider {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self { webhook_secret }
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge> {
        tracing::warn!(order_id = %request.order_id, "Using mock payment data, PrimePag not configured");
        Ok(mock_charge())
    }

    fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}
