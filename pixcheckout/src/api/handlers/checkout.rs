//! Public storefront endpoints. None of these take credentials.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::{
        handlers::ClientIp,
        models::{
            coupons::{CouponValidateRequest, CouponValidateResponse},
            orders::{CheckoutCreate, OrderResponse, OrderStatusResponse},
            products::ProductResponse,
        },
    },
    checkout::{self, CheckoutRequest},
    coupons::validate_coupon,
    db::handlers::{Coupons, Products},
    errors::{Error, Result},
    types::OrderId,
};

/// Place an order and receive its Pix charge.
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "storefront",
    request_body = CheckoutCreate,
    responses(
        (status = 201, description = "Order created with payment details", body = OrderResponse),
        (status = 400, description = "Invalid form, coupon or suspicious order"),
        (status = 403, description = "Client address is blocked"),
        (status = 404, description = "Product not found or inactive"),
        (status = 429, description = "Too many orders from this address"),
    )
)]
#[tracing::instrument(skip_all, fields(product_id = %request.product_id))]
pub async fn create_checkout(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(request): Json<CheckoutCreate>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let order = checkout::create_order(
        &state,
        CheckoutRequest {
            product_id: request.product_id,
            form: request.form(),
            coupon_code: request.coupon_code.filter(|c| !c.trim().is_empty()),
            client_ip,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

#[utoipa::path(
    get,
    path = "/orders/{id}/status",
    tag = "storefront",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order status", body = OrderStatusResponse),
        (status = 404, description = "Order not found"),
    )
)]
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn get_order_status(State(state): State<AppState>, Path(id): Path<OrderId>) -> Result<Json<OrderStatusResponse>> {
    let order = checkout::get_order_status(&state, id).await?;
    Ok(Json(order.into()))
}

/// Mark a pending order as paid. Disabled unless `payment.allow_simulation` is set.
#[utoipa::path(
    post,
    path = "/orders/{id}/simulate",
    tag = "storefront",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order marked as paid", body = OrderStatusResponse),
        (status = 403, description = "Simulation disabled"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not pending"),
    )
)]
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn simulate_payment(State(state): State<AppState>, Path(id): Path<OrderId>) -> Result<Json<OrderStatusResponse>> {
    let order = checkout::simulate_payment(&state, id).await?;
    Ok(Json(order.into()))
}

/// Preview a coupon against a product's current price. Rejections are reported in the body.
#[utoipa::path(
    post,
    path = "/coupons/validate",
    tag = "storefront",
    request_body = CouponValidateRequest,
    responses(
        (status = 200, description = "Validation result", body = CouponValidateResponse),
        (status = 404, description = "Product not found or inactive"),
    )
)]
#[tracing::instrument(skip_all, fields(product_id = %request.product_id))]
pub async fn validate_coupon_preview(
    State(state): State<AppState>,
    Json(request): Json<CouponValidateRequest>,
) -> Result<Json<CouponValidateResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let product = Products::new(&mut conn)
        .get_active(request.product_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Product".to_string(),
            id: request.product_id.to_string(),
        })?;
    let coupon = Coupons::new(&mut conn).get_by_code(&request.code.trim().to_uppercase()).await?;

    let response = match validate_coupon(coupon, product.price, product.id, Utc::now()) {
        Ok(applied) => CouponValidateResponse {
            valid: true,
            message: None,
            discount: Some(applied.discount),
            final_amount: Some(product.price - applied.discount),
            coupon_type: Some(applied.coupon.coupon_type),
        },
        Err(message) => CouponValidateResponse {
            valid: false,
            message: Some(message),
            discount: None,
            final_amount: None,
            coupon_type: None,
        },
    };
    Ok(Json(response))
}

/// Resolve a payment link to the product it sells.
#[utoipa::path(
    get,
    path = "/payment-links/{token}",
    tag = "storefront",
    params(("token" = String, Path, description = "Payment link token")),
    responses(
        (status = 200, description = "Linked product", body = ProductResponse),
        (status = 404, description = "Link missing, inactive or expired"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn resolve_payment_link(State(state): State<AppState>, Path(token): Path<String>) -> Result<Json<ProductResponse>> {
    let product = checkout::resolve_payment_link(&state, &token).await?;
    Ok(Json(product.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{
        coupons::{CouponCreateDBRequest, CouponType},
        orders::OrderStatus,
    };
    use crate::db::handlers::Repository;
    use crate::test_utils::{create_test_http_server, create_test_product, create_test_server, create_test_state};
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    fn checkout_body(product_id: impl std::fmt::Display) -> serde_json::Value {
        json!({
            "product_id": product_id.to_string(),
            "name": "Maria Silva",
            "email": "maria@example.com",
            "document": "529.982.247-25",
            "phone": "(11) 98765-4321",
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_checkout_then_poll_and_simulate(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let product = create_test_product(&pool, Decimal::new(10000, 2)).await;
        let server = create_test_server(state);

        let response = server.post("/api/v1/checkout").json(&checkout_body(product.id)).await;
        response.assert_status(StatusCode::CREATED);
        let order: OrderResponse = response.json();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Decimal::new(10000, 2));
        assert!(!order.payment_code.is_empty());

        let status: OrderStatusResponse = server.get(&format!("/api/v1/orders/{}/status", order.id)).await.json();
        assert_eq!(status.status, OrderStatus::Pending);

        let simulated = server.post(&format!("/api/v1/orders/{}/simulate", order.id)).await;
        simulated.assert_status_ok();
        let simulated: OrderStatusResponse = simulated.json();
        assert_eq!(simulated.status, OrderStatus::Paid);
        assert!(simulated.paid_at.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_forged_forwarded_for_does_not_dodge_rate_limit(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let product = create_test_product(&pool, Decimal::new(10000, 2)).await;
        let server = create_test_http_server(state);

        let mut statuses = Vec::new();
        for i in 0..8 {
            let mut body = checkout_body(product.id);
            body["email"] = json!(format!("cliente{i}@example.com"));
            let response = server
                .post("/api/v1/checkout")
                .add_header("x-forwarded-for", format!("203.0.113.{i}"))
                .json(&body)
                .await;
            statuses.push(response.status_code());
        }

        assert_eq!(&statuses[..5], &[StatusCode::CREATED; 5]);
        assert!(statuses[5..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS), "{statuses:?}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_trusted_proxy_addresses_are_limited_separately(pool: PgPool) {
        let mut state = create_test_state(pool.clone()).await;
        state.config.trusted_proxies = vec!["127.0.0.1".parse().unwrap()];
        let product = create_test_product(&pool, Decimal::new(10000, 2)).await;
        let server = create_test_http_server(state);

        for i in 0..7 {
            let mut body = checkout_body(product.id);
            body["email"] = json!(format!("cliente{i}@example.com"));
            server
                .post("/api/v1/checkout")
                .add_header("x-forwarded-for", format!("203.0.113.{i}"))
                .json(&body)
                .await
                .assert_status(StatusCode::CREATED);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_checkout_rejects_invalid_form(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let product = create_test_product(&pool, Decimal::new(10000, 2)).await;
        let server = create_test_server(state);

        let mut body = checkout_body(product.id);
        body["document"] = json!("111.111.111-11");
        server.post("/api/v1/checkout").json(&body).await.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_coupon_preview(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let product = create_test_product(&pool, Decimal::new(20000, 2)).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Coupons::new(&mut conn)
                .create(&CouponCreateDBRequest {
                    code: "PIX10".to_string(),
                    coupon_type: CouponType::Percentage,
                    value: Decimal::new(10, 0),
                    min_purchase_amount: None,
                    max_uses: None,
                    expires_at: None,
                    product_id: None,
                    active: true,
                })
                .await
                .unwrap();
        }
        let server = create_test_server(state);

        let ok: CouponValidateResponse = server
            .post("/api/v1/coupons/validate")
            .json(&json!({"code": "pix10", "product_id": product.id}))
            .await
            .json();
        assert!(ok.valid);
        assert_eq!(ok.discount, Some(Decimal::new(2000, 2)));
        assert_eq!(ok.final_amount, Some(Decimal::new(18000, 2)));

        let bad: CouponValidateResponse = server
            .post("/api/v1/coupons/validate")
            .json(&json!({"code": "NOPE", "product_id": product.id}))
            .await
            .json();
        assert!(!bad.valid);
        assert_eq!(bad.message.as_deref(), Some("Cupom inválido"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_payment_link_is_not_found(pool: PgPool) {
        let state = create_test_state(pool).await;
        let server = create_test_server(state);

        server
            .get("/api/v1/payment-links/does-not-exist")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
