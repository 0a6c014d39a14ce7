//! Aggregation queries over orders, products and customers.
//!
//! These back the scheduled reports, the analytics metric calculator and the admin dashboard.
//! Windows are half-open (`start <= created_at < end`) so consecutive report periods never
//! count an order twice. [`order_totals_through`] is the one exception: it closes the window
//! at `end` for caller-chosen metric ranges.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use moka::future::Cache;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use utoipa::ToSchema;

use crate::db::{
    errors::Result,
    models::{orders::OrderStatus, products::ProductType},
};
use crate::types::{CustomerId, ProductId};

/// Dashboard stats are cheap to compute but polled often by the admin UI.
static DASHBOARD_CACHE: Lazy<Cache<(), DashboardStats>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(std::time::Duration::from_secs(30))
        .build()
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct OrderTotals {
    pub total_orders: i64,
    pub paid_orders: i64,
    /// Sum of paid order totals
    pub total_sales: Decimal,
    /// Sum of all order totals regardless of status
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductSales {
    pub id: ProductId,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub active: bool,
    pub orders: i64,
    pub sales: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerSales {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub orders: i64,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow, ToSchema)]
pub struct DashboardStats {
    pub today_sales: Decimal,
    pub today_orders: i64,
    pub month_sales: Decimal,
    pub month_orders: i64,
    pub pending_orders: i64,
}

#[instrument(skip(pool), err)]
pub async fn order_totals(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<OrderTotals> {
    totals_between(pool, start, end, false).await
}

/// Like [`order_totals`], but orders created exactly at `end` are included.
#[instrument(skip(pool), err)]
pub async fn order_totals_through(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<OrderTotals> {
    totals_between(pool, start, end, true).await
}

async fn totals_between(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>, include_end: bool) -> Result<OrderTotals> {
    let totals = sqlx::query_as::<_, OrderTotals>(
        r#"
        SELECT
            COUNT(*) AS total_orders,
            COUNT(*) FILTER (WHERE status = 'paid') AS paid_orders,
            COALESCE(SUM(total_amount) FILTER (WHERE status = 'paid'), 0) AS total_sales,
            COALESCE(SUM(total_amount), 0) AS total_amount
        FROM orders
        WHERE created_at >= $1 AND (created_at < $2 OR ($3 AND created_at = $2))
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(include_end)
    .fetch_one(pool)
    .await?;

    Ok(totals)
}

#[instrument(skip(pool), err)]
pub async fn status_distribution(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<StatusCount>> {
    let rows = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM orders
        WHERE created_at >= $1 AND created_at < $2
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Paid revenue per calendar day (UTC).
#[instrument(skip(pool), err)]
pub async fn sales_by_day(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<DailySales>> {
    let rows = sqlx::query_as::<_, DailySales>(
        r#"
        SELECT
            (created_at AT TIME ZONE 'UTC')::date AS day,
            COUNT(*) AS orders,
            COALESCE(SUM(total_amount) FILTER (WHERE status = 'paid'), 0) AS revenue
        FROM orders
        WHERE created_at >= $1 AND created_at < $2
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every product with its order count, paid sales and revenue in the window.
#[instrument(skip(pool), err)]
pub async fn product_sales(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ProductSales>> {
    let rows = sqlx::query_as::<_, ProductSales>(
        r#"
        SELECT
            p.id, p.name, p.type, p.active,
            COUNT(o.id) AS orders,
            COUNT(o.id) FILTER (WHERE o.status = 'paid') AS sales,
            COALESCE(SUM(o.total_amount) FILTER (WHERE o.status = 'paid'), 0) AS revenue
        FROM products p
        LEFT JOIN orders o ON o.product_id = p.id AND o.created_at >= $1 AND o.created_at < $2
        GROUP BY p.id
        ORDER BY revenue DESC, p.name
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every customer with their order count and paid spend in the window.
#[instrument(skip(pool), err)]
pub async fn customer_sales(pool: &PgPool, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CustomerSales>> {
    let rows = sqlx::query_as::<_, CustomerSales>(
        r#"
        SELECT
            c.id, c.name, c.email,
            COUNT(o.id) AS orders,
            COALESCE(SUM(o.total_amount) FILTER (WHERE o.status = 'paid'), 0) AS total_spent
        FROM customers c
        LEFT JOIN orders o ON o.customer_id = c.id AND o.created_at >= $1 AND o.created_at < $2
        GROUP BY c.id
        ORDER BY total_spent DESC, c.name
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool), err)]
pub async fn customers_created_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers WHERE created_at >= $1")
        .bind(since)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Today and this month's paid sales, plus the number of orders awaiting payment.
#[instrument(skip(pool), err)]
pub async fn dashboard_stats(pool: &PgPool) -> Result<DashboardStats> {
    if let Some(stats) = DASHBOARD_CACHE.get(&()).await {
        return Ok(stats);
    }
    let stats = compute_dashboard_stats(pool, Utc::now()).await?;
    DASHBOARD_CACHE.insert((), stats.clone()).await;
    Ok(stats)
}

async fn compute_dashboard_stats(pool: &PgPool, now: DateTime<Utc>) -> Result<DashboardStats> {
    let stats = sqlx::query_as::<_, DashboardStats>(
        r#"
        SELECT
            COALESCE(SUM(total_amount) FILTER (WHERE status = 'paid' AND created_at >= $1), 0) AS today_sales,
            COUNT(*) FILTER (WHERE created_at >= $1) AS today_orders,
            COALESCE(SUM(total_amount) FILTER (WHERE status = 'paid' AND created_at >= $2), 0) AS month_sales,
            COUNT(*) FILTER (WHERE created_at >= $2) AS month_orders,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders
        FROM orders
        "#,
    )
    .bind(start_of_day(now))
    .bind(start_of_month(now))
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
