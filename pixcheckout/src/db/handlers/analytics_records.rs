//! Database repositories for tracked events, persisted metrics, predictions and dashboards.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::analytics::{
        AnalyticsDashboard, AnalyticsDashboardCreateDBRequest, AnalyticsEvent, AnalyticsEventCreateDBRequest, AnalyticsMetric,
        AnalyticsMetricCreateDBRequest, AnalyticsPrediction, AnalyticsPredictionCreateDBRequest,
    },
};
use crate::types::{DashboardId, abbrev_uuid};

pub struct AnalyticsEvents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AnalyticsEvents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(event_type = %request.event_type), err)]
    pub async fn create(&mut self, request: &AnalyticsEventCreateDBRequest) -> Result<AnalyticsEvent> {
        let event = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            INSERT INTO analytics_events (id, event_type, data, session_id, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.event_type)
        .bind(&request.data)
        .bind(&request.session_id)
        .bind(request.user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, event_type: Option<&str>, skip: i64, limit: i64) -> Result<Vec<AnalyticsEvent>> {
        let events = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            SELECT * FROM analytics_events
            WHERE ($1::text IS NULL OR event_type = $1)
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(event_type)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events)
    }
}

pub struct AnalyticsMetrics<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AnalyticsMetrics<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name, period = request.period.as_str()), err)]
    pub async fn create(&mut self, request: &AnalyticsMetricCreateDBRequest) -> Result<AnalyticsMetric> {
        let metric = sqlx::query_as::<_, AnalyticsMetric>(
            r#"
            INSERT INTO analytics_metrics (id, name, value, dimension, period, start_date, end_date, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.value)
        .bind(&request.dimension)
        .bind(request.period.as_str())
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(&request.metadata)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(metric)
    }

    /// Most recent metrics with this name, newest `start_date` first.
    #[instrument(skip(self), err)]
    pub async fn latest(&mut self, name: &str, limit: i64) -> Result<Vec<AnalyticsMetric>> {
        let metrics = sqlx::query_as::<_, AnalyticsMetric>(
            "SELECT * FROM analytics_metrics WHERE name = $1 ORDER BY start_date DESC LIMIT $2",
        )
        .bind(name)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(metrics)
    }
}

pub struct AnalyticsPredictions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AnalyticsPredictions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(target = %request.target_metric), err)]
    pub async fn create(&mut self, request: &AnalyticsPredictionCreateDBRequest) -> Result<AnalyticsPrediction> {
        let prediction = sqlx::query_as::<_, AnalyticsPrediction>(
            r#"
            INSERT INTO analytics_predictions (id, model_type, target_metric, prediction_date, predicted_value, confidence, features)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.model_type)
        .bind(&request.target_metric)
        .bind(request.prediction_date)
        .bind(request.predicted_value)
        .bind(request.confidence)
        .bind(&request.features)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(prediction)
    }
}

pub struct AnalyticsDashboards<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AnalyticsDashboards<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &AnalyticsDashboardCreateDBRequest) -> Result<AnalyticsDashboard> {
        let widgets = serde_json::to_value(&request.widgets).unwrap_or_else(|_| serde_json::json!([]));
        let dashboard = sqlx::query_as::<_, AnalyticsDashboard>(
            r#"
            INSERT INTO analytics_dashboards (id, name, description, layout, widgets)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.layout)
        .bind(widgets)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(dashboard)
    }

    #[instrument(skip(self), fields(dashboard_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: DashboardId) -> Result<Option<AnalyticsDashboard>> {
        let dashboard = sqlx::query_as::<_, AnalyticsDashboard>("SELECT * FROM analytics_dashboards WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(dashboard)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<AnalyticsDashboard>> {
        let dashboards = sqlx::query_as::<_, AnalyticsDashboard>("SELECT * FROM analytics_dashboards ORDER BY created_at DESC OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(dashboards)
    }

    #[instrument(skip(self), fields(dashboard_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: DashboardId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analytics_dashboards WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::analytics::{DashboardWidget, MetricPeriod};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_latest_metrics_ordered_by_start_date(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = AnalyticsMetrics::new(&mut conn);
        let now = Utc::now();

        for days_ago in [3, 1, 2] {
            let start = now - Duration::days(days_ago);
            repo.create(&AnalyticsMetricCreateDBRequest {
                name: "daily_sales".to_string(),
                value: Decimal::from(days_ago),
                dimension: "sales".to_string(),
                period: MetricPeriod::Daily,
                start_date: start,
                end_date: start + Duration::days(1),
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();
        }

        let latest = repo.latest("daily_sales", 2).await.unwrap();
        let values: Vec<Decimal> = latest.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![Decimal::from(1), Decimal::from(2)]);
        assert!(repo.latest("unknown", 7).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dashboard_widgets_round_trip(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = AnalyticsDashboards::new(&mut conn);

        let widgets = vec![DashboardWidget {
            metric: "daily_sales".to_string(),
            limit: Some(7),
            title: None,
        }];
        let dashboard = repo
            .create(&AnalyticsDashboardCreateDBRequest {
                name: "Vendas".to_string(),
                description: None,
                layout: serde_json::json!({"columns": 2}),
                widgets: widgets.clone(),
            })
            .await
            .unwrap();

        let fetched = repo.get_by_id(dashboard.id).await.unwrap().unwrap();
        assert_eq!(fetched.parsed_widgets(), widgets);
        assert!(repo.delete(dashboard.id).await.unwrap());
        assert!(repo.get_by_id(dashboard.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_track_event(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = AnalyticsEvents::new(&mut conn);

        repo.create(&AnalyticsEventCreateDBRequest {
            event_type: "page_view".to_string(),
            data: serde_json::json!({"path": "/checkout"}),
            session_id: Some("s1".to_string()),
            user_id: None,
        })
        .await
        .unwrap();

        assert_eq!(repo.list(Some("page_view"), 0, 10).await.unwrap().len(), 1);
        assert!(repo.list(Some("click"), 0, 10).await.unwrap().is_empty());
    }
}
