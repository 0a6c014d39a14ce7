//! Inbound payment webhooks from the PrimePag gateway.
//!
//! - [`signing`]: hex HMAC-SHA256 body signatures
//!
//! [`process_payment`] applies a verified payment update to its order. The order update, its
//! status history, the audit entry and the customer notification commit in one transaction;
//! email, WhatsApp and `order_paid` automations run afterwards and never fail the webhook.

pub mod signing;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::Acquire;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState, audit, automation,
    db::{
        handlers::Orders,
        models::orders::{Order, OrderPaymentUpdate, OrderStatus},
    },
    email::EmailTemplate,
    errors::{Error, Result},
    notifications, settings,
};

/// Charge update posted by the gateway.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaymentEvent {
    /// Gateway transaction id
    pub id: Option<String>,
    /// Our order id
    pub external_id: Option<String>,
    pub status: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    pub payment_method: Option<String>,
}

/// Gateway status "paid" pays the order; any other status expires it.
pub fn map_gateway_status(status: &str) -> OrderStatus {
    if status == "paid" { OrderStatus::Paid } else { OrderStatus::Expired }
}

fn missing_fields() -> Error {
    Error::BadRequest {
        message: "Missing required fields".to_string(),
    }
}

/// Apply a payment event to its order. Returns the order after the update; an order that is
/// already paid is returned unchanged.
#[instrument(skip(state, event), fields(external_id = ?event.external_id, status = ?event.status), err)]
pub async fn process_payment(state: &AppState, event: &PaymentEvent) -> Result<Order> {
    let (Some(transaction_id), Some(external_id), Some(status)) =
        (event.id.as_deref(), event.external_id.as_deref(), event.status.as_deref())
    else {
        return Err(missing_fields());
    };

    let not_found = || Error::NotFound {
        resource: "Order".to_string(),
        id: external_id.to_string(),
    };
    let order_id = Uuid::parse_str(external_id).map_err(|_| not_found())?;

    let update = OrderPaymentUpdate {
        status: map_gateway_status(status),
        paid_at: event.paid_at,
        transaction_id: transaction_id.to_string(),
        payment_method: event.payment_method.clone(),
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let current = Orders::new(&mut *conn).get_for_update(order_id).await?.ok_or_else(not_found)?;
    if current.status == OrderStatus::Paid {
        tracing::info!(order_id = %order_id, "Order already paid, ignoring webhook");
        return Ok(current);
    }

    let Some(updated) = Orders::new(&mut *conn).apply_payment_update(order_id, &update).await? else {
        return Ok(current);
    };
    Orders::new(&mut *conn).record_update(order_id, updated.status).await?;
    audit::record_order_update(&mut *conn, &current, &updated, None).await?;

    let amount = event.amount.unwrap_or(updated.total_amount);
    notifications::notify(&mut *conn, &notifications::payment_outcome(&updated, amount)).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(order_id = %order_id, status = %updated.status, "Applied payment webhook");
    metrics::counter!("pixcheckout_payment_webhooks_total", "status" => updated.status.to_string()).increment(1);

    notify_customer(state, &updated, amount).await;

    if updated.status == OrderStatus::Paid {
        let context = json!({
            "order_id": updated.id,
            "customer_id": updated.customer_id,
            "product_id": updated.product_id,
            "amount": amount,
            "status": updated.status,
        });
        if let Err(e) = automation::run_trigger(state, automation::ORDER_PAID_TRIGGER, &context).await {
            tracing::warn!(order_id = %order_id, error = %e, "order_paid automations failed");
        }
    }

    Ok(updated)
}

/// Email and WhatsApp follow-ups for a payment outcome. Failures are logged and dropped.
async fn notify_customer(state: &AppState, order: &Order, amount: Decimal) {
    let (details, app_settings) = {
        let mut conn = match state.db.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping payment messages, no database connection");
                return;
            }
        };
        let details = match Orders::new(&mut conn).get_details(order.id).await {
            Ok(Some(details)) => details,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping payment messages, order lookup failed");
                return;
            }
        };
        match settings::load(&mut conn, &state.cipher).await {
            Ok(s) => (details, s),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping payment messages, settings unavailable");
                return;
            }
        }
    };

    if order.status == OrderStatus::Paid && app_settings.notification_settings.email_enabled {
        let data = json!({
            "customerName": details.customer_name,
            "orderId": order.id,
            "amount": format!("{amount:.2}"),
            "paymentMethod": order.payment_method.clone().unwrap_or_else(|| "PIX".to_string()),
            "date": order.paid_at,
        });
        if let Err(e) = state
            .email
            .send(&state.db, &details.customer_email, &[], EmailTemplate::PaymentReceived, &data)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "Payment email failed");
        }
    }

    if app_settings.whatsapp_settings.enabled {
        let template = if order.status == OrderStatus::Paid {
            "payment_received"
        } else {
            "payment_expired"
        };
        let data = json!({
            "customer_name": details.customer_name,
            "order_id": order.id,
            "amount": format!("{amount:.2}"),
        });
        if let Err(e) = state
            .whatsapp
            .send(&state.db, &app_settings.whatsapp_settings, &details.customer_phone, template, &data)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "Payment WhatsApp message failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Notifications;
    use crate::db::handlers::notifications::NotificationFilter;
    use crate::test_utils::{create_test_customer, create_test_order, create_test_product, create_test_state};
    use sqlx::PgPool;

    fn event(order_id: &str, status: &str) -> PaymentEvent {
        PaymentEvent {
            id: Some("tx_123".to_string()),
            external_id: Some(order_id.to_string()),
            status: Some(status.to_string()),
            paid_at: Some(Utc::now()),
            amount: Some(Decimal::new(9700, 2)),
            payment_method: Some("pix".to_string()),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_gateway_status("paid"), OrderStatus::Paid);
        assert_eq!(map_gateway_status("expired"), OrderStatus::Expired);
        assert_eq!(map_gateway_status("refused"), OrderStatus::Expired);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_paid_webhook_updates_order(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(9700, 2)).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;

        let updated = process_payment(&state, &event(&order.id.to_string(), "paid")).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Paid);
        assert_eq!(updated.transaction_id.as_deref(), Some("tx_123"));
        assert_eq!(updated.payment_method.as_deref(), Some("pix"));
        assert!(updated.paid_at.is_some());

        let mut conn = pool.acquire().await.unwrap();
        let history = Orders::new(&mut conn).list_updates(order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Paid);

        let notes = Notifications::new(&mut conn)
            .list(&NotificationFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(notes.iter().any(|n| n.title == "Pagamento Confirmado"
            && n.content == "Seu pagamento de R$ 97.00 foi confirmado"
            && n.user_id == Some(customer.id)));
        assert!(notes.iter().any(|n| n.title == "Status do Pedido Atualizado"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_paid_order_is_not_moved_back(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::TEN).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Paid).await;

        let result = process_payment(&state, &event(&order.id.to_string(), "expired")).await.unwrap();
        assert_eq!(result.status, OrderStatus::Paid);

        let mut conn = pool.acquire().await.unwrap();
        assert!(Orders::new(&mut conn).list_updates(order.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_other_status_expires_order(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::TEN).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;

        let result = process_payment(&state, &event(&order.id.to_string(), "cancelled")).await.unwrap();
        assert_eq!(result.status, OrderStatus::Expired);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_fields_and_unknown_order(pool: PgPool) {
        let state = create_test_state(pool).await;

        let err = process_payment(&state, &PaymentEvent::default()).await.unwrap_err();
        assert_eq!(err.user_message(), "Missing required fields");

        let err = process_payment(&state, &event(&Uuid::new_v4().to_string(), "paid")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = process_payment(&state, &event("not-a-uuid", "paid")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
