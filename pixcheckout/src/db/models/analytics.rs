//! Database models for analytics events, metrics, predictions and dashboards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{DashboardId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetricPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl MetricPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AnalyticsEvent {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub event_type: String,
    pub data: serde_json::Value,
    pub session_id: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsEventCreateDBRequest {
    pub event_type: String,
    pub data: serde_json::Value,
    pub session_id: Option<String>,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AnalyticsMetric {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub name: String,
    pub value: Decimal,
    pub dimension: String,
    pub period: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsMetricCreateDBRequest {
    pub name: String,
    pub value: Decimal,
    pub dimension: String,
    pub period: MetricPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AnalyticsPrediction {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub model_type: String,
    pub target_metric: String,
    pub prediction_date: DateTime<Utc>,
    pub predicted_value: Decimal,
    pub confidence: f64,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsPredictionCreateDBRequest {
    pub model_type: String,
    pub target_metric: String,
    pub prediction_date: DateTime<Utc>,
    pub predicted_value: Decimal,
    pub confidence: f64,
    pub features: serde_json::Value,
}

/// A dashboard widget plots the history of one named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardWidget {
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AnalyticsDashboard {
    #[schema(value_type = String, format = "uuid")]
    pub id: DashboardId,
    pub name: String,
    pub description: Option<String>,
    pub layout: serde_json::Value,
    pub widgets: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsDashboard {
    pub fn parsed_widgets(&self) -> Vec<DashboardWidget> {
        serde_json::from_value(self.widgets.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsDashboardCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub layout: serde_json::Value,
    pub widgets: Vec<DashboardWidget>,
}
