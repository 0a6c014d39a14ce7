use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::analytics::{AnalyticsDashboardCreateDBRequest, DashboardWidget, MetricPeriod},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListEventsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub event_type: Option<String>,
}

/// Aggregate orders in `[start_date, end_date)` into a named metric.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CalculateMetricsRequest {
    pub name: String,
    pub period: MetricPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MetricHistoryQuery {
    /// Number of most recent values (default: 30, max: 100)
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub layout: serde_json::Value,
    #[serde(default)]
    pub widgets: Vec<DashboardWidget>,
}

impl From<DashboardCreate> for AnalyticsDashboardCreateDBRequest {
    fn from(d: DashboardCreate) -> Self {
        Self {
            name: d.name,
            description: d.description,
            layout: d.layout,
            widgets: d.widgets,
        }
    }
}
