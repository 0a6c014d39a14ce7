use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::payment_links::{ListPaymentLinksQuery, PaymentLinkCreate, PaymentLinkResponse},
    auth::permissions::{RequiresPermission, operation, resource},
    checkout,
    db::handlers::PaymentLinks,
    errors::{Error, Result},
    types::PaymentLinkId,
};

/// Create a shareable link to an active product. Links expire after
/// `checkout.payment_link_expiry`.
#[utoipa::path(
    post,
    path = "/payment-links",
    tag = "payment_links",
    request_body = PaymentLinkCreate,
    responses(
        (status = 201, description = "Link created", body = PaymentLinkResponse),
        (status = 404, description = "Product not found or inactive"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(product_id = %request.product_id))]
pub async fn create_payment_link(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::PaymentLinks, operation::CreateAll>,
    Json(request): Json<PaymentLinkCreate>,
) -> Result<(StatusCode, Json<PaymentLinkResponse>)> {
    let link = checkout::create_payment_link(&state, request.product_id, Some(current_user.id)).await?;
    Ok((StatusCode::CREATED, Json(PaymentLinkResponse::new(link, &state.config))))
}

#[utoipa::path(
    get,
    path = "/payment-links",
    tag = "payment_links",
    params(ListPaymentLinksQuery),
    responses((status = 200, description = "Payment links, newest first", body = Vec<PaymentLinkResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_payment_links(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentLinksQuery>,
    _: RequiresPermission<resource::PaymentLinks, operation::ReadAll>,
) -> Result<Json<Vec<PaymentLinkResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let links = PaymentLinks::new(&mut conn).list(query.product_id, skip, limit).await?;
    Ok(Json(links.into_iter().map(|l| PaymentLinkResponse::new(l, &state.config)).collect()))
}

#[utoipa::path(
    post,
    path = "/payment-links/{id}/deactivate",
    tag = "payment_links",
    params(("id" = String, Path, description = "Payment link ID")),
    responses(
        (status = 204, description = "Link deactivated"),
        (status = 404, description = "Link not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(link_id = %id))]
pub async fn deactivate_payment_link(
    State(state): State<AppState>,
    Path(id): Path<PaymentLinkId>,
    _: RequiresPermission<resource::PaymentLinks, operation::UpdateAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !PaymentLinks::new(&mut conn).deactivate(id).await? {
        return Err(Error::NotFound {
            resource: "Payment link".to_string(),
            id: id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}
