//! Event tracking, persisted sales metrics, naive predictions and metric dashboards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    db::{
        handlers::{
            analytics,
            analytics_records::{AnalyticsDashboards, AnalyticsEvents, AnalyticsMetrics, AnalyticsPredictions},
        },
        models::analytics::{
            AnalyticsDashboard, AnalyticsEvent, AnalyticsEventCreateDBRequest, AnalyticsMetric, AnalyticsMetricCreateDBRequest,
            AnalyticsPrediction, AnalyticsPredictionCreateDBRequest, MetricPeriod,
        },
    },
    errors::{Error, Result},
    types::{DashboardId, UserId},
};

/// Number of recent metric values averaged into a prediction.
const PREDICTION_HISTORY: i64 = 7;
const PREDICTION_CONFIDENCE: f64 = 0.95;
/// Points returned per dashboard widget when the widget sets no limit.
pub const DEFAULT_WIDGET_LIMIT: i64 = 30;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WidgetData {
    pub metric: String,
    pub title: Option<String>,
    pub data: Vec<AnalyticsMetric>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardData {
    pub dashboard: AnalyticsDashboard,
    pub widgets: Vec<WidgetData>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PredictionRequest {
    pub model_type: String,
    pub target_metric: String,
    #[serde(default)]
    pub features: serde_json::Value,
}

#[instrument(skip(pool, data), err)]
pub async fn track_event(
    pool: &PgPool,
    event_type: &str,
    data: serde_json::Value,
    session_id: Option<String>,
    user_id: Option<UserId>,
) -> Result<AnalyticsEvent> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let event = AnalyticsEvents::new(&mut conn)
        .create(&AnalyticsEventCreateDBRequest {
            event_type: event_type.to_string(),
            data,
            session_id,
            user_id,
        })
        .await?;
    Ok(event)
}

/// Paid orders over all orders in the window, as a percentage rounded to two places.
pub fn conversion_rate(paid_orders: i64, total_orders: i64) -> Decimal {
    if total_orders == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(paid_orders) * Decimal::ONE_HUNDRED / Decimal::from(total_orders)).round_dp(2)
}

/// Compute order metrics over `[start, end]` and persist them under `name`.
#[instrument(skip(pool), err)]
pub async fn calculate_metrics(
    pool: &PgPool,
    name: &str,
    period: MetricPeriod,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<AnalyticsMetric> {
    if end <= start {
        return Err(Error::BadRequest {
            message: "end_date must be after start_date".to_string(),
        });
    }

    let totals = analytics::order_totals_through(pool, start, end).await?;
    let metadata = json!({
        "total_orders": totals.total_orders,
        "total_amount": totals.total_amount,
        "paid_orders": totals.paid_orders,
        "conversion_rate": conversion_rate(totals.paid_orders, totals.total_orders),
    });

    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let metric = AnalyticsMetrics::new(&mut conn)
        .create(&AnalyticsMetricCreateDBRequest {
            name: name.to_string(),
            value: totals.total_amount,
            dimension: "sales".to_string(),
            period,
            start_date: start,
            end_date: end,
            metadata,
        })
        .await?;
    Ok(metric)
}

/// Mean of the given values, `None` when empty.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some((sum / Decimal::from(values.len())).round_dp(2))
}

/// Predict the next value of a metric as the mean of its recent history.
#[instrument(skip(pool, request), fields(target_metric = %request.target_metric), err)]
pub async fn generate_prediction(pool: &PgPool, request: &PredictionRequest) -> Result<AnalyticsPrediction> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let history = AnalyticsMetrics::new(&mut conn)
        .latest(&request.target_metric, PREDICTION_HISTORY)
        .await?;
    let values: Vec<Decimal> = history.iter().map(|m| m.value).collect();
    let predicted_value = mean(&values).ok_or_else(|| Error::BadRequest {
        message: "No historical data available for prediction".to_string(),
    })?;

    let prediction = AnalyticsPredictions::new(&mut conn)
        .create(&AnalyticsPredictionCreateDBRequest {
            model_type: request.model_type.clone(),
            target_metric: request.target_metric.clone(),
            prediction_date: Utc::now(),
            predicted_value,
            confidence: PREDICTION_CONFIDENCE,
            features: request.features.clone(),
        })
        .await?;

    tracing::debug!(predicted = %predicted_value, samples = values.len(), "Generated prediction");
    Ok(prediction)
}

/// Resolve every widget of a dashboard to its metric history.
#[instrument(skip(pool), err)]
pub async fn dashboard_data(pool: &PgPool, id: DashboardId) -> Result<DashboardData> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let dashboard = AnalyticsDashboards::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Dashboard".to_string(),
            id: id.to_string(),
        })?;

    let mut widgets = Vec::new();
    for widget in dashboard.parsed_widgets() {
        let limit = widget.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_WIDGET_LIMIT);
        let data = AnalyticsMetrics::new(&mut conn).latest(&widget.metric, limit).await?;
        widgets.push(WidgetData {
            metric: widget.metric,
            title: widget.title,
            data,
        });
    }

    Ok(DashboardData { dashboard, widgets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::analytics::{AnalyticsDashboardCreateDBRequest, DashboardWidget};
    use crate::db::models::orders::OrderStatus;
    use crate::test_utils::{create_test_customer, create_test_order, create_test_product};
    use chrono::Duration;

    #[test]
    fn test_conversion_rate() {
        assert_eq!(conversion_rate(0, 0), Decimal::ZERO);
        assert_eq!(conversion_rate(1, 3), Decimal::new(3333, 2));
        assert_eq!(conversion_rate(2, 2), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[Decimal::from(10), Decimal::from(20)]), Some(Decimal::from(15)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_calculate_metrics_persists_sales(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        create_test_order(&pool, customer.id, product.id, OrderStatus::Paid).await;
        create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;

        let start = Utc::now() - Duration::days(1);
        let end = Utc::now() + Duration::minutes(1);
        let metric = calculate_metrics(&pool, "daily_sales", MetricPeriod::Daily, start, end).await.unwrap();

        assert_eq!(metric.value, Decimal::new(10000, 2));
        assert_eq!(metric.dimension, "sales");
        assert_eq!(metric.period, "daily");
        assert_eq!(metric.metadata["paid_orders"], 1);
        assert_eq!(metric.metadata["total_orders"], 2);

        let err = calculate_metrics(&pool, "bad", MetricPeriod::Daily, end, start).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_metric_window_includes_its_end(pool: PgPool) {
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(5000, 2)).await;
        let at_end = create_test_order(&pool, customer.id, product.id, OrderStatus::Paid).await;
        let after_end = create_test_order(&pool, customer.id, product.id, OrderStatus::Paid).await;

        let end = DateTime::from_timestamp(Utc::now().timestamp() - 60, 0).unwrap();
        for (id, created_at) in [(at_end.id, end), (after_end.id, end + Duration::seconds(1))] {
            sqlx::query("UPDATE orders SET created_at = $2 WHERE id = $1")
                .bind(id)
                .bind(created_at)
                .execute(&pool)
                .await
                .unwrap();
        }

        let metric = calculate_metrics(&pool, "boundary", MetricPeriod::Daily, end - Duration::hours(1), end)
            .await
            .unwrap();
        assert_eq!(metric.metadata["total_orders"], 1);
        assert_eq!(metric.value, Decimal::new(5000, 2));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_prediction_needs_history(pool: PgPool) {
        let request = PredictionRequest {
            model_type: "moving_average".to_string(),
            target_metric: "daily_sales".to_string(),
            features: json!({}),
        };
        let err = generate_prediction(&pool, &request).await.unwrap_err();
        assert_eq!(err.user_message(), "No historical data available for prediction");

        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(3000, 2)).await;
        create_test_order(&pool, customer.id, product.id, OrderStatus::Paid).await;
        let now = Utc::now();
        calculate_metrics(&pool, "daily_sales", MetricPeriod::Daily, now - Duration::days(1), now + Duration::minutes(1))
            .await
            .unwrap();
        calculate_metrics(&pool, "daily_sales", MetricPeriod::Daily, now - Duration::days(3), now - Duration::days(2))
            .await
            .unwrap();

        let prediction = generate_prediction(&pool, &request).await.unwrap();
        assert_eq!(prediction.predicted_value, Decimal::new(1500, 2));
        assert_eq!(prediction.confidence, 0.95);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dashboard_data(pool: PgPool) {
        let now = Utc::now();
        for days in 1..=3 {
            calculate_metrics(
                &pool,
                "daily_sales",
                MetricPeriod::Daily,
                now - Duration::days(days + 1),
                now - Duration::days(days),
            )
            .await
            .unwrap();
        }

        let dashboard = {
            let mut conn = pool.acquire().await.unwrap();
            AnalyticsDashboards::new(&mut conn)
                .create(&AnalyticsDashboardCreateDBRequest {
                    name: "Vendas".to_string(),
                    description: None,
                    layout: json!({}),
                    widgets: vec![
                        DashboardWidget {
                            metric: "daily_sales".to_string(),
                            limit: Some(2),
                            title: None,
                        },
                        DashboardWidget {
                            metric: "daily_sales".to_string(),
                            limit: None,
                            title: Some("Tudo".to_string()),
                        },
                    ],
                })
                .await
                .unwrap()
        };

        let data = dashboard_data(&pool, dashboard.id).await.unwrap();
        assert_eq!(data.widgets[0].data.len(), 2);
        assert_eq!(data.widgets[1].data.len(), 3);
        assert!(data.widgets[0].data[0].start_date > data.widgets[0].data[1].start_date);

        let err = dashboard_data(&pool, uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
