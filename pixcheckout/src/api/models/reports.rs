//! Report schedule payloads.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::reports::{ReportFormat, ReportFrequency, ReportScheduleUpdateDBRequest, ReportType},
    types::ReportScheduleId,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportScheduleCreate {
    pub name: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub frequency: ReportFrequency,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReportScheduleUpdate {
    pub name: Option<String>,
    pub format: Option<ReportFormat>,
    pub frequency: Option<ReportFrequency>,
    pub recipients: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl From<ReportScheduleUpdate> for ReportScheduleUpdateDBRequest {
    fn from(u: ReportScheduleUpdate) -> Self {
        Self {
            name: u.name,
            format: u.format,
            frequency: u.frequency,
            recipients: u.recipients,
            active: u.active,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListReportLogsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[param(value_type = Option<String>, format = "uuid")]
    pub schedule_id: Option<ReportScheduleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailySummaryResponse {
    /// Number of summary emails delivered
    pub sent: usize,
}
