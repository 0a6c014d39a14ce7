//! Customer checkout: order placement, status polling, payment simulation and payment links.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use sqlx::Acquire;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState, audit,
    coupons::validate_coupon,
    crypto::generate_token,
    db::{
        handlers::{BlockedIps, Coupons, Customers, Orders, PaymentLinks, Products},
        models::{
            customers::CustomerUpsertDBRequest,
            orders::{Order, OrderCreateDBRequest, OrderPaymentUpdate, OrderStatus},
            payment_links::{PaymentLink, PaymentLinkCreateDBRequest},
            products::Product,
        },
    },
    email::EmailTemplate,
    errors::{Error, Result},
    notifications,
    payment_providers::{self, ChargeCustomer, ChargeRequest},
    security::{FraudSignals, FraudVerdict, detect_fraud},
    settings,
    types::{OrderId, ProductId, UserId},
    validation::{CheckoutForm, only_digits, validate_checkout_form},
};

/// Window over which unpaid orders count as repeated payment attempts.
const ATTEMPT_WINDOW_HOURS: i64 = 1;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product_id: ProductId,
    pub form: CheckoutForm,
    pub coupon_code: Option<String>,
    pub client_ip: String,
}

fn to_chrono(duration: Duration) -> Result<ChronoDuration> {
    ChronoDuration::from_std(duration).map_err(|e| Error::Internal {
        operation: format!("convert duration: {e}"),
    })
}

fn order_not_found(id: OrderId) -> Error {
    Error::NotFound {
        resource: "Order".to_string(),
        id: id.to_string(),
    }
}

/// Place an order and generate its Pix charge.
#[instrument(skip(state, request), fields(product_id = %request.product_id), err)]
pub async fn create_order(state: &AppState, request: CheckoutRequest) -> Result<Order> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let product = Products::new(&mut conn)
        .get_active(request.product_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Product".to_string(),
            id: request.product_id.to_string(),
        })?;

    let field_errors = validate_checkout_form(&request.form);
    if !field_errors.is_empty() {
        return Err(Error::Validation { fields: field_errors });
    }

    if BlockedIps::new(&mut conn).is_blocked(&request.client_ip).await? {
        return Err(Error::Forbidden {
            message: "Acesso bloqueado".to_string(),
        });
    }

    let limits = &state.config.checkout.rate_limit;
    if !state
        .limiters
        .checkout
        .check(&format!("{}_order", request.client_ip), limits.max_attempts, limits.window)
    {
        return Err(Error::TooManyRequests {
            message: "Muitas tentativas. Aguarde um minuto.".to_string(),
        });
    }

    let email = request.form.email.trim().to_lowercase();
    let since = Utc::now() - ChronoDuration::hours(ATTEMPT_WINDOW_HOURS);
    let attempts = Orders::new(&mut conn).count_unpaid_by_email_since(&email, since).await?;
    let verdict = detect_fraud(
        &FraudSignals {
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            email: &email,
            document: &request.form.document,
        },
        &state.config.checkout.temporary_email_domains,
    );
    if let FraudVerdict::Suspicious { reason } = verdict {
        tracing::warn!(ip = %request.client_ip, reason, "Checkout flagged as suspicious");
        return Err(Error::BadRequest {
            message: format!("Não foi possível processar o pedido: {reason}"),
        });
    }

    let applied = match request.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let coupon = Coupons::new(&mut conn).get_by_code(code).await?;
            let applied = validate_coupon(coupon, product.price, product.id, Utc::now())
                .map_err(|message| Error::BadRequest { message })?;
            Some(applied)
        }
        None => None,
    };

    let app_settings = settings::load(&mut conn, &state.cipher).await?;
    let expiry = app_settings
        .payment_settings
        .auto_expire_time
        .filter(|m| *m > 0)
        .map(|m| Duration::from_secs(u64::from(m) * 60))
        .unwrap_or(state.config.checkout.order_expiry);

    let discount = applied.as_ref().map(|a| a.discount).unwrap_or_default();
    let total = (product.price - discount).max(rust_decimal::Decimal::ZERO);

    let (customer, order) = {
        let mut tx = conn.begin().await.map_err(|e| Error::Database(e.into()))?;

        let customer = Customers::new(&mut tx)
            .upsert_by_email(&CustomerUpsertDBRequest {
                name: request.form.name.trim().to_string(),
                email: email.clone(),
                cpf: only_digits(&request.form.document),
                phone: only_digits(&request.form.phone),
            })
            .await?;

        let order = Orders::new(&mut tx)
            .create(&OrderCreateDBRequest {
                id: Uuid::new_v4(),
                customer_id: customer.id,
                product_id: product.id,
                total_amount: total,
                discount_amount: discount,
                coupon_id: applied.as_ref().map(|a| a.coupon.id),
                expires_at: Utc::now() + to_chrono(expiry)?,
            })
            .await?;
        Orders::new(&mut tx).record_update(order.id, order.status).await?;

        // Dropping the transaction rolls back the order when another checkout took the last use
        if let Some(applied) = &applied
            && !Coupons::new(&mut tx).increment_uses(applied.coupon.id).await?
        {
            return Err(Error::BadRequest {
                message: "Cupom esgotado".to_string(),
            });
        }
        notifications::notify(&mut tx, &notifications::new_order(&order)).await?;

        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        (customer, order)
    };

    let provider = payment_providers::create_provider(&app_settings.payment_settings, &state.config.payment);
    let charge = payment_providers::create_charge_with_fallback(
        provider.as_ref(),
        &ChargeRequest {
            order_id: order.id,
            amount: total,
            description: product.name.clone(),
            customer: ChargeCustomer {
                name: customer.name.clone(),
                email: customer.email.clone(),
                document: customer.cpf.clone(),
            },
            expires_in: expiry,
            callback_url: state.config.payment_callback_url(),
        },
    )
    .await;

    let order = Orders::new(&mut conn)
        .set_payment_details(order.id, &charge.qr_code, &charge.payment_code)
        .await?;

    tracing::info!(order_id = %order.id, total = %order.total_amount, "Order created");
    metrics::counter!("pixcheckout_orders_created_total").increment(1);

    if app_settings.notification_settings.email_enabled {
        let cc: Vec<String> = app_settings.notification_settings.send_copy_to.iter().cloned().collect();
        let data = json!({
            "customerName": customer.name,
            "orderId": order.id,
            "productName": product.name,
            "amount": format!("{:.2}", order.total_amount),
            "date": order.created_at.format("%d/%m/%Y %H:%M").to_string(),
        });
        if let Err(e) = state
            .email
            .send(&state.db, &customer.email, &cc, EmailTemplate::OrderConfirmation, &data)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "Order confirmation email failed");
        }
    }

    Ok(order)
}

/// Public status view used by the checkout page to poll for payment.
#[instrument(skip(state), err)]
pub async fn get_order_status(state: &AppState, order_id: OrderId) -> Result<Order> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Orders::new(&mut conn)
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))
}

/// Mark a pending order as paid without a gateway. Only available when
/// `payment.allow_simulation` is set.
#[instrument(skip(state), err)]
pub async fn simulate_payment(state: &AppState, order_id: OrderId) -> Result<Order> {
    if !state.config.payment.allow_simulation {
        return Err(Error::Forbidden {
            message: "Payment simulation is disabled".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let current = Orders::new(&mut *conn)
        .get_for_update(order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;
    if current.status != OrderStatus::Pending {
        return Err(Error::Conflict {
            message: format!("Order is already {}", current.status),
        });
    }

    let now = Utc::now();
    let update = OrderPaymentUpdate {
        status: OrderStatus::Paid,
        paid_at: Some(now),
        transaction_id: format!("sim_{}", now.timestamp_millis()),
        payment_method: Some("pix".to_string()),
    };
    let updated = Orders::new(&mut *conn)
        .apply_payment_update(order_id, &update)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;
    Orders::new(&mut *conn).record_update(order_id, updated.status).await?;
    audit::record_order_update(&mut *conn, &current, &updated, None).await?;
    notifications::notify(&mut *conn, &notifications::payment_simulated(&updated)).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(order_id = %order_id, "Simulated payment");
    Ok(updated)
}

/// Move an order to `status` on behalf of an admin or an automation. Only the transitions
/// allowed by [`OrderStatus::can_transition_to`] are accepted.
#[instrument(skip(state), err)]
pub async fn change_order_status(state: &AppState, order_id: OrderId, status: OrderStatus, user_id: Option<UserId>) -> Result<Order> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let current = Orders::new(&mut *conn)
        .get_for_update(order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;
    if !current.status.can_transition_to(status) {
        return Err(Error::Conflict {
            message: format!("Order cannot move from {} to {}", current.status, status),
        });
    }

    let updated = Orders::new(&mut *conn).update_status(order_id, status).await?;
    Orders::new(&mut *conn).record_update(order_id, status).await?;
    audit::record_order_update(&mut *conn, &current, &updated, user_id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(order_id = %order_id, from = %current.status, to = %status, "Order status changed");
    Ok(updated)
}

/// Create a shareable link to a product's checkout.
#[instrument(skip(state), err)]
pub async fn create_payment_link(state: &AppState, product_id: ProductId, created_by: Option<UserId>) -> Result<PaymentLink> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Products::new(&mut conn).get_active(product_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Product".to_string(),
            id: product_id.to_string(),
        });
    }

    let link = PaymentLinks::new(&mut conn)
        .create(&PaymentLinkCreateDBRequest {
            product_id,
            url_token: generate_token(),
            expires_at: Utc::now() + to_chrono(state.config.checkout.payment_link_expiry)?,
            created_by,
        })
        .await?;
    Ok(link)
}

/// Resolve a payment link token to its product. Missing, inactive and expired links all
/// read as not found.
#[instrument(skip(state, token), err)]
pub async fn resolve_payment_link(state: &AppState, token: &str) -> Result<Product> {
    let not_found = || Error::NotFound {
        resource: "Payment link".to_string(),
        id: token.to_string(),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let link = PaymentLinks::new(&mut conn)
        .get_by_token(token)
        .await?
        .filter(|link| link.is_usable(Utc::now()))
        .ok_or_else(not_found)?;

    Products::new(&mut conn)
        .get_active(link.product_id)
        .await?
        .ok_or_else(not_found)
}
