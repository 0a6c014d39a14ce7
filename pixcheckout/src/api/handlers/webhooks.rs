//! Gateway webhook endpoint. Replies are JSON (`{"success": true}` or `{"error": ...}`) so the
//! gateway can log them, unlike the plain-text errors of the rest of the API.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    AppState,
    errors::Error,
    payment_providers,
    settings,
    webhooks::{self, PaymentEvent},
};

fn reply_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn error_response(error: &Error) -> Response {
    let status = match error {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Database(_) | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    reply_error(status, error.user_message())
}

/// Receive a signed charge update from the payment gateway.
#[utoipa::path(
    post,
    path = "/webhooks/primepag",
    tag = "webhooks",
    request_body = PaymentEvent,
    params(("x-primepag-signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body")),
    responses(
        (status = 200, description = "Update applied"),
        (status = 400, description = "Missing or invalid signature, malformed payload or missing fields"),
        (status = 404, description = "Order not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn primepag_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let payment_settings = {
        let mut conn = match state.db.acquire().await {
            Ok(conn) => conn,
            Err(e) => return error_response(&Error::Database(e.into())),
        };
        match settings::load(&mut conn, &state.cipher).await {
            Ok(current) => current.payment_settings,
            Err(e) => return error_response(&e),
        }
    };

    let provider = payment_providers::create_provider(&payment_settings, &state.config.payment);
    if let Err(e) = provider.verify_signature(&headers, &body) {
        tracing::warn!(provider = provider.name(), error = %e, "Rejected webhook signature");
        let message = e.to_string();
        return reply_error(StatusCode::from(e), message);
    }

    let event: PaymentEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            return reply_error(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };

    match webhooks::process_payment(&state, &event).await {
        Ok(order) => {
            tracing::debug!(order_id = %order.id, status = %order.status, "Webhook processed");
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{orders::OrderStatus, settings::PaymentSettings};
    use crate::test_utils::{create_test_customer, create_test_order, create_test_product, create_test_server, create_test_state};
    use crate::webhooks::signing;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    const SECRET: &str = "whsec_test";

    async fn configure_secret(pool: &PgPool, state: &crate::AppState) {
        let mut conn = pool.acquire().await.unwrap();
        crate::settings::update_payment(
            &mut conn,
            &state.cipher,
            &PaymentSettings {
                webhook_secret: Some(SECRET.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_signed_webhook_pays_order(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        configure_secret(&pool, &state).await;
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(2990, 2)).await;
        let order = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;
        let server = create_test_server(state);

        let body = serde_json::to_vec(&json!({
            "id": "txn_123",
            "external_id": order.id.to_string(),
            "status": "paid",
            "payment_method": "pix",
        }))
        .unwrap();

        let response = server
            .post("/webhooks/primepag")
            .add_header("x-primepag-signature", signing::sign(SECRET, &body))
            .bytes(body.into())
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({"success": true}));

        let status: Value = server.get(&format!("/api/v1/orders/{}/status", order.id)).await.json();
        assert_eq!(status["status"], "paid");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_signature_is_required(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        configure_secret(&pool, &state).await;
        let server = create_test_server(state);
        let body = br#"{"id": "txn_1", "external_id": "x", "status": "paid"}"#.to_vec();

        let missing = server.post("/webhooks/primepag").bytes(body.clone().into()).await;
        missing.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(missing.json::<Value>()["error"], "Missing signature");

        let forged = server
            .post("/webhooks/primepag")
            .add_header("x-primepag-signature", signing::sign("other-secret", &body))
            .bytes(body.into())
            .await;
        forged.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(forged.json::<Value>()["error"], "Invalid signature");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_order_and_missing_fields(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        configure_secret(&pool, &state).await;
        let server = create_test_server(state);

        let unknown = serde_json::to_vec(&json!({
            "id": "txn_9",
            "external_id": uuid::Uuid::new_v4().to_string(),
            "status": "paid",
        }))
        .unwrap();
        server
            .post("/webhooks/primepag")
            .add_header("x-primepag-signature", signing::sign(SECRET, &unknown))
            .bytes(unknown.into())
            .await
            .assert_status_not_found();

        let incomplete = br#"{"status": "paid"}"#.to_vec();
        let response = server
            .post("/webhooks/primepag")
            .add_header("x-primepag-signature", signing::sign(SECRET, &incomplete))
            .bytes(incomplete.into())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Missing required fields");
    }
}
