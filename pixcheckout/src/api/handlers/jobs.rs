use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::jobs::ExpireOrdersResponse,
    auth::permissions::{RequiresPermission, operation, resource},
    errors::Result,
    jobs,
};

/// Expire overdue pending orders now instead of waiting for the background sweeper.
#[utoipa::path(
    post,
    path = "/jobs/expire-orders",
    tag = "jobs",
    responses((status = 200, description = "Number of orders expired", body = ExpireOrdersResponse)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn expire_orders(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Orders, operation::SystemAccess>,
) -> Result<Json<ExpireOrdersResponse>> {
    let expired = jobs::expire_orders(&state.db).await?;
    Ok(Json(ExpireOrdersResponse { expired }))
}

#[cfg(test)]
mod tests {
    use crate::db::models::orders::OrderStatus;
    use crate::test_utils::{
        admin_cookie, create_test_admin_user, create_test_customer, create_test_order, create_test_product, create_test_server,
        create_test_state,
    };
    use rust_decimal::Decimal;
    use serde_json::Value;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_expire_orders_endpoint(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(1000, 2)).await;
        let overdue = create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;
        create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;
        sqlx::query("UPDATE orders SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
            .bind(overdue.id)
            .execute(&pool)
            .await
            .unwrap();
        let server = create_test_server(state.clone());

        let response: Value = server
            .post("/admin/api/v1/jobs/expire-orders")
            .add_header("cookie", admin_cookie(&state.config, &admin))
            .await
            .json();
        assert_eq!(response["expired"], 1);
    }
}
