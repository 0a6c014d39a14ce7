//! PrimePag gateway provider
//!
//! Creates Pix charges with `POST {api_url}/charges` authenticated by a bearer token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::payment_providers::{Charge, ChargeCustomer, ChargeRequest, PaymentError, PaymentProvider, Result};

pub struct PrimePagProvider {
    client: reqwest::Client,
    api_url: String,
    token: String,
    webhook_secret: Option<String>,
}

impl PrimePagProvider {
    pub fn new(api_url: &str, token: &str, webhook_secret: Option<String>, timeout: Duration) -> Self {
        crate::install_crypto_provider();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            webhook_secret,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateChargeBody<'a> {
    amount: i64,
    currency: &'static str,
    payment_method: &'static str,
    description: &'a str,
    external_id: String,
    customer: &'a ChargeCustomer,
    /// Seconds
    expiration: u64,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct PixData {
    qr_code: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct CreateChargeResponse {
    #[serde(default)]
    id: Option<String>,
    pix: PixData,
}

#[async_trait]
impl PaymentProvider for PrimePagProvider {
    fn name(&self) -> &'static str {
        "primepag"
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge> {
        let body = CreateChargeBody {
            amount: request.amount_cents()?,
            currency: "BRL",
            payment_method: "pix",
            description: &request.description,
            external_id: request.order_id.to_string(),
            customer: &request.customer,
            expiration: request.expires_in.as_secs(),
            callback_url: &request.callback_url,
        };

        let response = self
            .client
            .post(format!("{}/charges", self.api_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %text, "PrimePag rejected charge");
            return Err(PaymentError::ProviderApi(format!("Failed to create payment ({status})")));
        }

        let parsed: CreateChargeResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("Unexpected charge response: {e}")))?;

        tracing::info!(order_id = %request.order_id, charge_id = ?parsed.id, "Created PrimePag charge");

        Ok(Charge {
            id: parsed.id,
            qr_code: parsed.pix.qr_code,
            payment_code: parsed.pix.code,
        })
    }

    fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(order_id: Uuid) -> ChargeRequest {
        ChargeRequest {
            order_id,
            amount: Decimal::new(4990, 2),
            description: "Ebook".to_string(),
            customer: ChargeCustomer {
                name: "Maria Silva".to_string(),
                email: "maria@example.com".to_string(),
                document: "52998224725".to_string(),
            },
            expires_in: Duration::from_secs(1800),
            callback_url: "https://shop.example.com/webhooks/primepag".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_charge() {
        let server = MockServer::start().await;
        let order_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/charges"))
            .and(bearer_token("tok_test"))
            .and(body_partial_json(serde_json::json!({
                "amount": 4990,
                "currency": "BRL",
                "payment_method": "pix",
                "external_id": order_id.to_string(),
                "expiration": 1800,
                "customer": {"name": "Maria Silva", "email": "maria@example.com", "document": "52998224725"},
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "ch_123",
                "pix": {"qr_code": "data:image/png;base64,QR", "code": "000201PIX"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PrimePagProvider::new(&format!("{}/", server.uri()), "tok_test", None, Duration::from_secs(5));
        let charge = provider.create_charge(&request(order_id)).await.unwrap();

        assert_eq!(charge.id.as_deref(), Some("ch_123"));
        assert_eq!(charge.qr_code, "data:image/png;base64,QR");
        assert_eq!(charge.payment_code, "000201PIX");
    }

    #[tokio::test]
    async fn test_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid document"))
            .mount(&server)
            .await;

        let provider = PrimePagProvider::new(&server.uri(), "tok_test", None, Duration::from_secs(5));
        let err = provider.create_charge(&request(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, PaymentError::ProviderApi(_)));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let provider = PrimePagProvider::new(&server.uri(), "tok_test", None, Duration::from_secs(5));
        assert!(provider.create_charge(&request(Uuid::new_v4())).await.is_err());
    }
}
