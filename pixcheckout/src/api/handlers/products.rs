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
        pagination::PaginatedResponse,
        products::{ListProductsQuery, ProductCreate, ProductResponse, ProductUpdate},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Products, Repository, products::ProductFilter},
        models::audit_logs::AuditAction,
    },
    errors::{Error, Result},
    types::ProductId,
};

fn product_not_found(id: ProductId) -> Error {
    Error::NotFound {
        resource: "Product".to_string(),
        id: id.to_string(),
    }
}

fn check_price(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Price must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Public product page data. Inactive products are not found.
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "storefront",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found or inactive"),
    )
)]
#[tracing::instrument(skip_all, fields(product_id = %id))]
pub async fn get_public_product(State(state): State<AppState>, Path(id): Path<ProductId>) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn).get_active(id).await?.ok_or_else(|| product_not_found(id))?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Paginated products", body = PaginatedResponse<ProductResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
    _: RequiresPermission<resource::Products, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ProductResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut repo = Products::new(&mut conn);
    let products = repo
        .list(&ProductFilter {
            active_only: query.active_only,
            ..ProductFilter::new(skip, limit)
        })
        .await?;
    let total = repo.count(query.active_only).await?;

    Ok(Json(PaginatedResponse::new(
        products.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(product_id = %id))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    _: RequiresPermission<resource::Products, operation::ReadAll>,
) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut conn).get_by_id(id).await?.ok_or_else(|| product_not_found(id))?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = ProductCreate,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Products, operation::CreateAll>,
    Json(request): Json<ProductCreate>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    if request.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Product name is required".to_string(),
        });
    }
    check_price(request.price)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let product = Products::new(&mut *conn).create(&request.into()).await?;
    audit::record(
        &mut *conn,
        "products",
        &product.id.to_string(),
        AuditAction::Insert,
        None,
        Some(&product),
        Some(current_user.id),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "products",
    request_body = ProductUpdate,
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 404, description = "Product not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    current_user: RequiresPermission<resource::Products, operation::UpdateAll>,
    Json(request): Json<ProductUpdate>,
) -> Result<Json<ProductResponse>> {
    if let Some(price) = request.price {
        check_price(price)?;
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = Products::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| product_not_found(id))?;
    let product = Products::new(&mut *conn).update(id, &request.into()).await?;
    audit::record(
        &mut *conn,
        "products",
        &id.to_string(),
        AuditAction::Update,
        Some(&old),
        Some(&product),
        Some(current_user.id),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(product.into()))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Product has orders"),
        (status = 404, description = "Product not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(product_id = %id))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    current_user: RequiresPermission<resource::Products, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = Products::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| product_not_found(id))?;
    Products::new(&mut *conn).delete(id).await?;
    audit::record(
        &mut *conn,
        "products",
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
