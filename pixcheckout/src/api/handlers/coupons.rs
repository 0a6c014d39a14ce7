use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use sqlx::Acquire;

use crate::{
    AppState, audit,
    api::models::{
        coupons::{CouponCreate, CouponResponse, CouponUpdate, ListCouponsQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Coupons, Repository, coupons::CouponFilter},
        models::{audit_logs::AuditAction, coupons::CouponType},
    },
    errors::{Error, Result},
    types::CouponId,
};

fn coupon_not_found(id: CouponId) -> Error {
    Error::NotFound {
        resource: "Coupon".to_string(),
        id: id.to_string(),
    }
}

fn check_value(coupon_type: Option<CouponType>, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Coupon value must be greater than zero".to_string(),
        });
    }
    if coupon_type == Some(CouponType::Percentage) && value > Decimal::ONE_HUNDRED {
        return Err(Error::BadRequest {
            message: "Percentage coupons cannot exceed 100".to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/coupons",
    tag = "coupons",
    params(ListCouponsQuery),
    responses(
        (status = 200, description = "Paginated coupons", body = PaginatedResponse<CouponResponse>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(query): Query<ListCouponsQuery>,
    _: RequiresPermission<resource::Coupons, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<CouponResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut repo = Coupons::new(&mut conn);
    let coupons = repo
        .list(&CouponFilter {
            active_only: query.active_only,
            ..CouponFilter::new(skip, limit)
        })
        .await?;
    let total = repo.count(query.active_only).await?;

    Ok(Json(PaginatedResponse::new(
        coupons.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/coupons/{id}",
    tag = "coupons",
    params(("id" = String, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon", body = CouponResponse),
        (status = 404, description = "Coupon not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(coupon_id = %id))]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
    _: RequiresPermission<resource::Coupons, operation::ReadAll>,
) -> Result<Json<CouponResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coupon = Coupons::new(&mut conn).get_by_id(id).await?.ok_or_else(|| coupon_not_found(id))?;
    Ok(Json(coupon.into()))
}

/// Create a coupon. Codes are stored upper-cased and must be unique.
#[utoipa::path(
    post,
    path = "/coupons",
    tag = "coupons",
    request_body = CouponCreate,
    responses(
        (status = 201, description = "Coupon created", body = CouponResponse),
        (status = 400, description = "Invalid coupon"),
        (status = 409, description = "Code already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_coupon(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Coupons, operation::CreateAll>,
    Json(request): Json<CouponCreate>,
) -> Result<(StatusCode, Json<CouponResponse>)> {
    if request.code.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Coupon code is required".to_string(),
        });
    }
    check_value(Some(request.coupon_type), request.value)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let coupon = Coupons::new(&mut *conn).create(&request.into()).await?;
    audit::record(
        &mut *conn,
        "coupons",
        &coupon.id.to_string(),
        AuditAction::Insert,
        None,
        Some(&coupon),
        Some(current_user.id),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(coupon.into())))
}

#[utoipa::path(
    patch,
    path = "/coupons/{id}",
    tag = "coupons",
    request_body = CouponUpdate,
    params(("id" = String, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon updated", body = CouponResponse),
        (status = 404, description = "Coupon not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(coupon_id = %id))]
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
    current_user: RequiresPermission<resource::Coupons, operation::UpdateAll>,
    Json(request): Json<CouponUpdate>,
) -> Result<Json<CouponResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = Coupons::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| coupon_not_found(id))?;
    if let Some(value) = request.value {
        check_value(Some(old.coupon_type), value)?;
    }

    let coupon = Coupons::new(&mut *conn).update(id, &request.into()).await?;
    audit::record(
        &mut *conn,
        "coupons",
        &id.to_string(),
        AuditAction::Update,
        Some(&old),
        Some(&coupon),
        Some(current_user.id),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(coupon.into()))
}

#[utoipa::path(
    delete,
    path = "/coupons/{id}",
    tag = "coupons",
    params(("id" = String, Path, description = "Coupon ID")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(coupon_id = %id))]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
    current_user: RequiresPermission<resource::Coupons, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = Coupons::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| coupon_not_found(id))?;
    Coupons::new(&mut *conn).delete(id).await?;
    audit::record(
        &mut *conn,
        "coupons",
        &id.to_string(),
        AuditAction::Delete,
        Some(&old),
        None,
        Some(current_user.id),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
