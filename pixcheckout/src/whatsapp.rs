//! WhatsApp gateway client.
//!
//! Messages are built from the text templates stored in `whatsapp_settings`, where `{key}`
//! placeholders are replaced with values from the request data. Every attempt is written to
//! `whatsapp_logs`.

use std::time::Duration;

use chrono::Utc;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    config::WhatsAppConfig,
    db::{
        handlers::WhatsAppLogs,
        models::{
            message_logs::{DeliveryStatus, MessageLogCreateDBRequest, WhatsAppLog},
            settings::WhatsAppSettings,
        },
    },
    errors::Error,
};

/// Failed messages are resent a few at a time.
const RESEND_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResendSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    instance_id: &'a str,
    to: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    message_id: Option<String>,
}

/// Replace every `{key}` with the matching value. Strings are inserted verbatim, other JSON
/// values in their JSON text form.
pub fn render_template(template: &str, data: &serde_json::Value) -> String {
    let Some(fields) = data.as_object() else {
        return template.to_string();
    };

    fields.iter().fold(template.to_string(), |text, (key, value)| {
        let replacement = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text.replace(&format!("{{{key}}}"), &replacement)
    })
}

#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    resend_window: Duration,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Self {
        crate::install_crypto_provider();
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            resend_window: config.resend_window,
        }
    }

    /// Render a stored template and send it to `to`.
    #[instrument(skip(self, pool, settings, data), fields(template = %template), err)]
    pub async fn send(
        &self,
        pool: &PgPool,
        settings: &WhatsAppSettings,
        to: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<WhatsAppLog, Error> {
        if !settings.enabled {
            return Err(Error::BadRequest {
                message: "WhatsApp notifications are disabled".to_string(),
            });
        }
        let text = settings.templates.get(template).ok_or_else(|| Error::BadRequest {
            message: "Template not found".to_string(),
        })?;
        let message = render_template(text, data);

        let outcome = self.deliver(settings, to, &message).await;

        let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let log = WhatsAppLogs::new(&mut conn)
            .create(&MessageLogCreateDBRequest {
                to: to.to_string(),
                template: template.to_string(),
                data: data.clone(),
                status: if outcome.is_ok() {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                },
                message_id: outcome.as_ref().ok().cloned().flatten(),
                error: outcome.as_ref().err().map(ToString::to_string),
            })
            .await?;

        outcome.map(|_| log)
    }

    async fn deliver(&self, settings: &WhatsAppSettings, to: &str, message: &str) -> Result<Option<String>, Error> {
        let (Some(api_url), Some(api_key), Some(instance_id)) = (
            settings.api_url.as_deref().filter(|s| !s.is_empty()),
            settings.api_key.as_deref().filter(|s| !s.is_empty()),
            settings.instance_id.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(Error::BadRequest {
                message: "WhatsApp gateway is not configured".to_string(),
            });
        };

        let response = self
            .client
            .post(format!("{}/messages", api_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&OutgoingMessage { instance_id, to, message })
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("send WhatsApp message: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Internal {
                operation: format!("send WhatsApp message: gateway returned {status}: {body}"),
            });
        }

        let parsed: GatewayResponse = response.json().await.unwrap_or(GatewayResponse { message_id: None });
        Ok(parsed.message_id)
    }

    /// Retry every failed message inside the resend window.
    #[instrument(skip_all, err)]
    pub async fn resend_failed(&self, pool: &PgPool, settings: &WhatsAppSettings) -> Result<ResendSummary, Error> {
        let window = chrono::Duration::from_std(self.resend_window).unwrap_or_else(|_| chrono::Duration::days(1));
        let since = Utc::now() - window;
        let failed = {
            let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
            WhatsAppLogs::new(&mut conn).failed_since(since).await?
        };

        let total = failed.len();
        let delivered: Vec<bool> = stream::iter(failed)
            .map(|log| async move {
                match self.send(pool, settings, &log.to_phone, &log.template, &log.data).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(log_id = %log.id, error = %e, "WhatsApp resend failed");
                        false
                    }
                }
            })
            .buffer_unordered(RESEND_CONCURRENCY)
            .collect()
            .await;

        let success = delivered.iter().filter(|ok| **ok).count();
        let summary = ResendSummary {
            total,
            success,
            failed: total - success,
        };

        tracing::info!(total = summary.total, success = summary.success, failed = summary.failed, "Resent failed WhatsApp messages");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::message_logs::MessageLogFilter;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(api_url: &str) -> WhatsAppSettings {
        WhatsAppSettings {
            enabled: true,
            api_url: Some(api_url.to_string()),
            api_key: Some("wa_key".to_string()),
            instance_id: Some("inst_1".to_string()),
            templates: BTreeMap::from([(
                "payment_received".to_string(),
                "Olá {customer_name}, pagamento do pedido {order_id} de R$ {amount} confirmado!".to_string(),
            )]),
        }
    }

    #[test]
    fn test_render_template() {
        let text = render_template(
            "Olá {customer_name}, pedido {order_id}, total {amount} {missing}",
            &json!({"customer_name": "Maria", "order_id": "abc", "amount": 10.5}),
        );
        assert_eq!(text, "Olá Maria, pedido abc, total 10.5 {missing}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_send_posts_rendered_message(pool: PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(bearer_token("wa_key"))
            .and(body_json(json!({
                "instance_id": "inst_1",
                "to": "5511987654321",
                "message": "Olá Maria, pagamento do pedido abc de R$ 97.00 confirmado!",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "wamid.1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&WhatsAppConfig::default());
        let log = client
            .send(
                &pool,
                &settings(&server.uri()),
                "5511987654321",
                "payment_received",
                &json!({"customer_name": "Maria", "order_id": "abc", "amount": "97.00"}),
            )
            .await
            .unwrap();

        assert_eq!(log.status, "sent");
        assert_eq!(log.message_id.as_deref(), Some("wamid.1"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_disabled_and_unknown_template(pool: PgPool) {
        let client = WhatsAppClient::new(&WhatsAppConfig::default());
        let mut disabled = settings("http://127.0.0.1:9");
        disabled.enabled = false;

        let err = client.send(&pool, &disabled, "1", "payment_received", &json!({})).await.unwrap_err();
        assert_eq!(err.user_message(), "WhatsApp notifications are disabled");

        let err = client
            .send(&pool, &settings("http://127.0.0.1:9"), "1", "nope", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Template not found");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_send_is_logged_and_resent(pool: PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "wamid.2"})))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&WhatsAppConfig::default());
        let settings = settings(&server.uri());
        let data = json!({"customer_name": "Maria", "order_id": "abc", "amount": "1.00"});

        assert!(client.send(&pool, &settings, "5511", "payment_received", &data).await.is_err());

        let summary = client.resend_failed(&pool, &settings).await.unwrap();
        assert_eq!(
            summary,
            ResendSummary {
                total: 1,
                success: 1,
                failed: 0
            }
        );

        let mut conn = pool.acquire().await.unwrap();
        let logs = WhatsAppLogs::new(&mut conn)
            .list(&MessageLogFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs.iter().filter(|l| l.status == "failed").count(), 1);
    }
}
