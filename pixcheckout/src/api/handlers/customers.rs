use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        customers::{CustomerDetailResponse, CustomerResponse, ListCustomersQuery},
        pagination::{MAX_LIMIT, PaginatedResponse},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Customers, Orders},
        models::orders::OrderFilter,
    },
    errors::{Error, Result},
    types::CustomerId,
};

#[utoipa::path(
    get,
    path = "/customers",
    tag = "customers",
    params(ListCustomersQuery),
    responses(
        (status = 200, description = "Paginated customers", body = PaginatedResponse<CustomerResponse>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListCustomersQuery>,
    _: RequiresPermission<resource::Customers, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<CustomerResponse>>> {
    let (skip, limit) = query.pagination.params();
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Customers::new(&mut conn);
    let customers = repo.list(skip, limit, search).await?;
    let total = repo.count(search).await?;

    Ok(Json(PaginatedResponse::new(
        customers.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    )))
}

/// Customer with their most recent orders.
#[utoipa::path(
    get,
    path = "/customers/{id}",
    tag = "customers",
    params(("id" = String, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer with orders", body = CustomerDetailResponse),
        (status = 404, description = "Customer not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(customer_id = %id))]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    _: RequiresPermission<resource::Customers, operation::ReadAll>,
) -> Result<Json<CustomerDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let customer = Customers::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Customer".to_string(),
        id: id.to_string(),
    })?;
    let orders = Orders::new(&mut conn)
        .list(&OrderFilter {
            limit: MAX_LIMIT,
            customer_id: Some(id),
            ..Default::default()
        })
        .await?;

    Ok(Json(CustomerDetailResponse {
        customer: customer.into(),
        orders: orders.into_iter().map(Into::into).collect(),
    }))
}
