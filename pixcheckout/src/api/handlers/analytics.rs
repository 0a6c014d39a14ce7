use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    analytics::{self, DEFAULT_WIDGET_LIMIT, DashboardData, PredictionRequest},
    api::models::{
        analytics::{CalculateMetricsRequest, DashboardCreate, ListEventsQuery, MetricHistoryQuery, TrackEventRequest},
        pagination::{MAX_LIMIT, Pagination},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::analytics_records::{AnalyticsDashboards, AnalyticsEvents, AnalyticsMetrics},
        models::analytics::{AnalyticsDashboard, AnalyticsEvent, AnalyticsMetric, AnalyticsPrediction},
    },
    errors::{Error, Result},
    types::DashboardId,
};

#[utoipa::path(
    post,
    path = "/analytics/events",
    tag = "analytics",
    request_body = TrackEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = AnalyticsEvent),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn track_event(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Analytics, operation::CreateAll>,
    Json(request): Json<TrackEventRequest>,
) -> Result<(StatusCode, Json<AnalyticsEvent>)> {
    if request.event_type.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "event_type is required".to_string(),
        });
    }
    let event = analytics::track_event(&state.db, &request.event_type, request.data, request.session_id, Some(current_user.id)).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    get,
    path = "/analytics/events",
    tag = "analytics",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Tracked events, newest first", body = Vec<AnalyticsEvent>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
    _: RequiresPermission<resource::Analytics, operation::ReadAll>,
) -> Result<Json<Vec<AnalyticsEvent>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let events = AnalyticsEvents::new(&mut conn)
        .list(query.event_type.as_deref(), skip, limit)
        .await?;
    Ok(Json(events))
}

#[utoipa::path(
    post,
    path = "/analytics/metrics/calculate",
    tag = "analytics",
    request_body = CalculateMetricsRequest,
    responses(
        (status = 200, description = "Metric computed and stored", body = AnalyticsMetric),
        (status = 400, description = "Empty window"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub async fn calculate_metrics(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Analytics, operation::CreateAll>,
    Json(request): Json<CalculateMetricsRequest>,
) -> Result<Json<AnalyticsMetric>> {
    let metric = analytics::calculate_metrics(&state.db, &request.name, request.period, request.start_date, request.end_date).await?;
    Ok(Json(metric))
}

#[utoipa::path(
    get,
    path = "/analytics/metrics/{name}",
    tag = "analytics",
    params(("name" = String, Path, description = "Metric name"), MetricHistoryQuery),
    responses(
        (status = 200, description = "Most recent values of the metric", body = Vec<AnalyticsMetric>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(name = %name))]
pub async fn metric_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<MetricHistoryQuery>,
    _: RequiresPermission<resource::Analytics, operation::ReadAll>,
) -> Result<Json<Vec<AnalyticsMetric>>> {
    let limit = query.limit.unwrap_or(DEFAULT_WIDGET_LIMIT).clamp(1, MAX_LIMIT);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let metrics = AnalyticsMetrics::new(&mut conn).latest(&name, limit).await?;
    Ok(Json(metrics))
}

#[utoipa::path(
    post,
    path = "/analytics/predictions",
    tag = "analytics",
    request_body = PredictionRequest,
    responses(
        (status = 200, description = "Prediction stored", body = AnalyticsPrediction),
        (status = 400, description = "No history for the target metric"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn generate_prediction(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Analytics, operation::CreateAll>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<AnalyticsPrediction>> {
    let prediction = analytics::generate_prediction(&state.db, &request).await?;
    Ok(Json(prediction))
}

#[utoipa::path(
    get,
    path = "/analytics/dashboards",
    tag = "analytics",
    params(Pagination),
    responses(
        (status = 200, description = "Dashboards", body = Vec<AnalyticsDashboard>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_dashboards(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::Analytics, operation::ReadAll>,
) -> Result<Json<Vec<AnalyticsDashboard>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let dashboards = AnalyticsDashboards::new(&mut conn).list(skip, limit).await?;
    Ok(Json(dashboards))
}

#[utoipa::path(
    post,
    path = "/analytics/dashboards",
    tag = "analytics",
    request_body = DashboardCreate,
    responses(
        (status = 201, description = "Dashboard created", body = AnalyticsDashboard),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_dashboard(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Analytics, operation::CreateAll>,
    Json(request): Json<DashboardCreate>,
) -> Result<(StatusCode, Json<AnalyticsDashboard>)> {
    if request.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Dashboard name is required".to_string(),
        });
    }
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let dashboard = AnalyticsDashboards::new(&mut conn).create(&request.into()).await?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}

#[utoipa::path(
    delete,
    path = "/analytics/dashboards/{id}",
    tag = "analytics",
    params(("id" = String, Path, description = "Dashboard ID")),
    responses(
        (status = 204, description = "Dashboard deleted"),
        (status = 404, description = "Dashboard not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(dashboard_id = %id))]
pub async fn delete_dashboard(
    State(state): State<AppState>,
    Path(id): Path<DashboardId>,
    _: RequiresPermission<resource::Analytics, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !AnalyticsDashboards::new(&mut conn).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Dashboard".to_string(),
            id: id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Every widget of the dashboard resolved to its metric history.
#[utoipa::path(
    get,
    path = "/analytics/dashboards/{id}/data",
    tag = "analytics",
    params(("id" = String, Path, description = "Dashboard ID")),
    responses(
        (status = 200, description = "Dashboard data", body = DashboardData),
        (status = 404, description = "Dashboard not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(dashboard_id = %id))]
pub async fn dashboard_data(
    State(state): State<AppState>,
    Path(id): Path<DashboardId>,
    _: RequiresPermission<resource::Analytics, operation::ReadAll>,
) -> Result<Json<DashboardData>> {
    let data = analytics::dashboard_data(&state.db, id).await?;
    Ok(Json(data))
}

#[cfg(test)]
mod tests {
    use crate::db::models::orders::OrderStatus;
    use crate::test_utils::{
        admin_cookie, create_test_admin_user, create_test_customer, create_test_order, create_test_product, create_test_server,
        create_test_state,
    };
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_metrics_feed_predictions_and_dashboards(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let customer = create_test_customer(&pool).await;
        let product = create_test_product(&pool, Decimal::new(10000, 2)).await;
        create_test_order(&pool, customer.id, product.id, OrderStatus::Paid).await;
        create_test_order(&pool, customer.id, product.id, OrderStatus::Pending).await;
        let server = create_test_server(state);

        // Nothing to predict from yet
        server
            .post("/admin/api/v1/analytics/predictions")
            .add_header("cookie", cookie.clone())
            .json(&json!({"model_type": "moving_average", "target_metric": "vendas"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let end = Utc::now() + Duration::minutes(1);
        let metric: Value = server
            .post("/admin/api/v1/analytics/metrics/calculate")
            .add_header("cookie", cookie.clone())
            .json(&json!({"name": "vendas", "period": "daily", "start_date": end - Duration::days(1), "end_date": end}))
            .await
            .json();
        assert_eq!(metric["value"], "100.00");
        assert_eq!(metric["metadata"]["total_orders"], 2);
        assert_eq!(metric["metadata"]["paid_orders"], 1);

        let prediction: Value = server
            .post("/admin/api/v1/analytics/predictions")
            .add_header("cookie", cookie.clone())
            .json(&json!({"model_type": "moving_average", "target_metric": "vendas"}))
            .await
            .json();
        assert_eq!(prediction["predicted_value"], "100.00");
        assert_eq!(prediction["confidence"], 0.95);

        let dashboard: Value = server
            .post("/admin/api/v1/analytics/dashboards")
            .add_header("cookie", cookie.clone())
            .json(&json!({"name": "Vendas", "widgets": [{"metric": "vendas", "limit": 5}]}))
            .await
            .json();
        let data: Value = server
            .get(&format!("/admin/api/v1/analytics/dashboards/{}/data", dashboard["id"].as_str().unwrap()))
            .add_header("cookie", cookie)
            .await
            .json();
        assert_eq!(data["widgets"][0]["data"].as_array().unwrap().len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_track_and_list_events(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let server = create_test_server(state);

        for event_type in ["page_view", "page_view", "checkout_started"] {
            server
                .post("/admin/api/v1/analytics/events")
                .add_header("cookie", cookie.clone())
                .json(&json!({"event_type": event_type, "data": {"path": "/"}, "session_id": "s1"}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let events: Value = server
            .get("/admin/api/v1/analytics/events")
            .add_query_param("event_type", "page_view")
            .add_header("cookie", cookie)
            .await
            .json();
        assert_eq!(events.as_array().unwrap().len(), 2);
        assert_eq!(events[0]["user_id"], admin.id.to_string());
    }
}
