use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState, checkout,
    api::models::{
        orders::{ListOrdersQuery, OrderDetailResponse, OrderResponse, OrderStatusUpdate},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::Orders,
        models::orders::{OrderFilter, OrderStatus},
    },
    errors::{Error, Result},
    types::OrderId,
};

#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Paginated orders", body = PaginatedResponse<OrderResponse>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
    _: RequiresPermission<resource::Orders, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<OrderResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = OrderFilter {
        skip,
        limit,
        status: query.status,
        customer_id: query.customer_id,
        product_id: query.product_id,
        created_after: query.start_date,
        created_before: query.end_date,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Orders::new(&mut conn);
    let orders = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        orders.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

/// Order with customer and product names plus its status history.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = OrderDetailResponse),
        (status = 404, description = "Order not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    _: RequiresPermission<resource::Orders, operation::ReadAll>,
) -> Result<Json<OrderDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Orders::new(&mut conn);
    let order = repo.get_details(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Order".to_string(),
        id: id.to_string(),
    })?;
    let history = repo.list_updates(id).await?;

    Ok(Json(OrderDetailResponse {
        order: order.into(),
        history: history.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    tag = "orders",
    request_body = OrderStatusUpdate,
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(order_id = %id, status = %request.status))]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    current_user: RequiresPermission<resource::Orders, operation::UpdateAll>,
    Json(request): Json<OrderStatusUpdate>,
) -> Result<Json<OrderResponse>> {
    let order = checkout::change_order_status(&state, id, request.status, Some(current_user.id)).await?;
    Ok(Json(order.into()))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    tag = "orders",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order can no longer be cancelled"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    current_user: RequiresPermission<resource::Orders, operation::UpdateAll>,
) -> Result<Json<OrderResponse>> {
    let order = checkout::change_order_status(&state, id, OrderStatus::Cancelled, Some(current_user.id)).await?;
    Ok(Json(order.into()))
}
