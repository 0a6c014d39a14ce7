//! Transactional email: template rendering, delivery and the `email_logs` trail.
//!
//! Templates are minijinja sources compiled once when the service is built. Every delivery
//! attempt, successful or not, is written to `email_logs`.

use std::{path::Path, str::FromStr};

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    config::{EmailConfig, EmailTransportConfig},
    db::{
        handlers::EmailLogs,
        models::message_logs::{DeliveryStatus, EmailLog, MessageLogCreateDBRequest},
    },
    errors::Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    OrderConfirmation,
    PaymentReceived,
    PaymentExpired,
    AccessGranted,
    DailySummary,
    WeeklyReport,
    ScheduledReport,
}

impl EmailTemplate {
    pub const ALL: [EmailTemplate; 7] = [
        Self::OrderConfirmation,
        Self::PaymentReceived,
        Self::PaymentExpired,
        Self::AccessGranted,
        Self::DailySummary,
        Self::WeeklyReport,
        Self::ScheduledReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order_confirmation",
            Self::PaymentReceived => "payment_received",
            Self::PaymentExpired => "payment_expired",
            Self::AccessGranted => "access_granted",
            Self::DailySummary => "daily_summary",
            Self::WeeklyReport => "weekly_report",
            Self::ScheduledReport => "scheduled_report",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderConfirmation => "Pedido Confirmado",
            Self::PaymentReceived => "Pagamento Recebido",
            Self::PaymentExpired => "Pagamento Expirado",
            Self::AccessGranted => "Acesso Liberado",
            Self::DailySummary => "Resumo Diário",
            Self::WeeklyReport => "Relatório Semanal",
            Self::ScheduledReport => "Relatório Agendado",
        }
    }

    /// Keys that must be present in the template data.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::OrderConfirmation => &["customerName", "orderId", "productName", "amount", "date"],
            Self::PaymentReceived => &["customerName", "orderId", "amount", "paymentMethod"],
            Self::PaymentExpired => &["customerName", "orderId"],
            Self::AccessGranted => &["customerName", "orderId", "productName"],
            Self::DailySummary => &["newOrders", "confirmedPayments", "totalAmount"],
            Self::WeeklyReport => &["startDate", "endDate", "totalOrders", "totalAmount", "paidOrders", "conversionRate"],
            Self::ScheduledReport => &["report_name", "report_url"],
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Self::OrderConfirmation => ORDER_CONFIRMATION,
            Self::PaymentReceived => PAYMENT_RECEIVED,
            Self::PaymentExpired => PAYMENT_EXPIRED,
            Self::AccessGranted => ACCESS_GRANTED,
            Self::DailySummary => DAILY_SUMMARY,
            Self::WeeklyReport => WEEKLY_REPORT,
            Self::ScheduledReport => SCHEDULED_REPORT,
        }
    }
}

impl FromStr for EmailTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::BadRequest {
                message: "Invalid template".to_string(),
            })
    }
}

const LAYOUT_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { max-width: 600px; margin: 0 auto; padding: 20px; }
        .footer { margin-top: 30px; font-size: 12px; color: #666; }
    </style>
</head>
<body>
<div class="container">
"#;

const LAYOUT_FOOT: &str = r#"
<div class="footer"><p>Esta é uma mensagem automática, por favor não responda.</p></div>
</div>
</body>
</html>"#;

const ORDER_CONFIRMATION: &str = r#"<h2>Pedido Confirmado</h2>
<p>Olá {{ customerName }},</p>
<p>Recebemos o seu pedido <strong>{{ orderId }}</strong> de {{ date }}.</p>
<p>Produto: {{ productName }}<br>Valor: R$ {{ amount }}</p>
<p>Assim que o pagamento via Pix for confirmado você receberá um novo email.</p>"#;

const PAYMENT_RECEIVED: &str = r#"<h2>Pagamento Recebido</h2>
<p>Olá {{ customerName }},</p>
<p>O pagamento do pedido <strong>{{ orderId }}</strong> no valor de R$ {{ amount }} foi confirmado via {{ paymentMethod }}.</p>"#;

const PAYMENT_EXPIRED: &str = r#"<h2>Pagamento Expirado</h2>
<p>Olá {{ customerName }},</p>
<p>O prazo para pagamento do pedido <strong>{{ orderId }}</strong> expirou.{% if amount %} Valor: R$ {{ amount }}.{% endif %}</p>
<p>Se ainda tiver interesse, faça um novo pedido.</p>"#;

const ACCESS_GRANTED: &str = r#"<h2>Acesso Liberado</h2>
<p>Olá {{ customerName }},</p>
<p>Seu acesso ao produto <strong>{{ productName }}</strong> (pedido {{ orderId }}) foi liberado.</p>"#;

const DAILY_SUMMARY: &str = r#"<h2>Resumo Diário</h2>
{% if date %}<p>{{ date }}</p>{% endif %}
<ul>
<li>Novos pedidos: {{ newOrders }}</li>
<li>Pagamentos confirmados: {{ confirmedPayments }}</li>
<li>Total: R$ {{ totalAmount }}</li>
{% if conversionRate %}<li>Conversão: {{ conversionRate }}%</li>{% endif %}
</ul>"#;

const WEEKLY_REPORT: &str = r#"<h2>Relatório Semanal</h2>
<p>{{ startDate }} a {{ endDate }}</p>
<ul>
<li>Pedidos: {{ totalOrders }}</li>
<li>Pagos: {{ paidOrders }}</li>
<li>Vendas: R$ {{ totalAmount }}</li>
<li>Conversão: {{ conversionRate }}%</li>
</ul>
{% if topProducts %}<h3>Mais vendidos</h3>
<ol>{% for p in topProducts %}<li>{{ p.name }}: {{ p.sales }} vendas, R$ {{ p.revenue }}</li>{% endfor %}</ol>{% endif %}"#;

const SCHEDULED_REPORT: &str = r#"<h2>{{ report_name }}</h2>
<p>O relatório agendado foi gerado e está disponível em:</p>
<p><a href="{{ report_url }}">{{ report_url }}</a></p>"#;

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
    reply_to: Option<Mailbox>,
    templates: Environment<'static>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, Error> {
        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;
        let reply_to = config
            .reply_to
            .as_deref()
            .map(str::parse::<Mailbox>)
            .transpose()
            .map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;

        let mut templates = Environment::new();
        for template in EmailTemplate::ALL {
            templates
                .add_template(template.as_str(), template.source())
                .map_err(|e| Error::Internal {
                    operation: format!("compile email template {}: {e}", template.as_str()),
                })?;
        }

        Ok(Self {
            transport,
            from,
            reply_to,
            templates,
        })
    }

    /// Render a template after checking its required fields.
    pub fn render(&self, template: EmailTemplate, data: &serde_json::Value) -> Result<RenderedEmail, Error> {
        let has_all = template
            .required_fields()
            .iter()
            .all(|field| data.get(field).is_some_and(|v| !v.is_null()));
        if !has_all {
            return Err(Error::BadRequest {
                message: "Missing required fields".to_string(),
            });
        }

        let body = self
            .templates
            .get_template(template.as_str())
            .and_then(|t| t.render(data))
            .map_err(|e| Error::Internal {
                operation: format!("render email template {}: {e}", template.as_str()),
            })?;

        Ok(RenderedEmail {
            subject: template.subject().to_string(),
            html: format!("{LAYOUT_HEAD}{body}{LAYOUT_FOOT}"),
        })
    }

    /// Render, deliver and log one email. Delivery failures are logged and returned.
    #[instrument(skip(self, pool, data), fields(template = template.as_str()), err)]
    pub async fn send(
        &self,
        pool: &PgPool,
        to: &str,
        cc: &[String],
        template: EmailTemplate,
        data: &serde_json::Value,
    ) -> Result<EmailLog, Error> {
        let rendered = self.render(template, data)?;
        let outcome = self.deliver(to, cc, &rendered).await;

        let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let log = EmailLogs::new(&mut conn)
            .create(&MessageLogCreateDBRequest {
                to: to.to_string(),
                template: template.as_str().to_string(),
                data: data.clone(),
                status: if outcome.is_ok() {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                },
                message_id: None,
                error: outcome.as_ref().err().map(ToString::to_string),
            })
            .await?;

        outcome.map(|_| log)
    }

    async fn deliver(&self, to: &str, cc: &[String], email: &RenderedEmail) -> Result<(), Error> {
        let to = to.parse::<Mailbox>().map_err(|e| Error::BadRequest {
            message: format!("Invalid recipient address: {e}"),
        })?;

        let mut builder = Message::builder().from(self.from.clone()).to(to).subject(&email.subject);
        for address in cc {
            let mailbox = address.parse::<Mailbox>().map_err(|e| Error::BadRequest {
                message: format!("Invalid cc address: {e}"),
            })?;
            builder = builder.cc(mailbox);
        }
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::EmailLogs;
    use crate::db::models::message_logs::MessageLogFilter;
    use serde_json::json;

    fn file_config(dir: &Path) -> EmailConfig {
        EmailConfig {
            transport: EmailTransportConfig::File {
                path: dir.to_string_lossy().into_owned(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_template_names() {
        assert_eq!("payment_received".parse::<EmailTemplate>().unwrap(), EmailTemplate::PaymentReceived);
        match "newsletter".parse::<EmailTemplate>() {
            Err(Error::BadRequest { message }) => assert_eq!(message, "Invalid template"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_render_order_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let rendered = service
            .render(
                EmailTemplate::OrderConfirmation,
                &json!({
                    "customerName": "Maria",
                    "orderId": "abc-123",
                    "productName": "Curso de Rust",
                    "amount": "97.00",
                    "date": "2024-05-01",
                }),
            )
            .unwrap();

        assert_eq!(rendered.subject, "Pedido Confirmado");
        assert!(rendered.html.contains("Olá Maria"));
        assert!(rendered.html.contains("R$ 97.00"));
        assert!(rendered.html.contains("Curso de Rust"));
    }

    #[test]
    fn test_render_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let err = service
            .render(EmailTemplate::PaymentExpired, &json!({"customerName": "Maria"}))
            .unwrap_err();
        assert_eq!(err.user_message(), "Missing required fields");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_send_writes_file_and_log(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        service
            .send(
                &pool,
                "maria@example.com",
                &["loja@example.com".to_string()],
                EmailTemplate::PaymentExpired,
                &json!({"customerName": "Maria", "orderId": "abc"}),
            )
            .await
            .unwrap();

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 1);

        let mut conn = pool.acquire().await.unwrap();
        let logs = EmailLogs::new(&mut conn)
            .list(&MessageLogFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "sent");
        assert_eq!(logs[0].template, "payment_expired");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalid_recipient_is_logged_as_failed(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let result = service
            .send(
                &pool,
                "not an address",
                &[],
                EmailTemplate::PaymentExpired,
                &json!({"customerName": "Maria", "orderId": "abc"}),
            )
            .await;
        assert!(result.is_err());

        let mut conn = pool.acquire().await.unwrap();
        let logs = EmailLogs::new(&mut conn)
            .list(&MessageLogFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "failed");
        assert!(logs[0].error.is_some());
    }
}
