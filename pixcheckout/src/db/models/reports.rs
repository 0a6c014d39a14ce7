//! Database models for scheduled reports and their run history.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::ReportScheduleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Sales,
    Products,
    Customers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Html,
    Pdf,
    Excel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    Daily,
    Weekly,
    Monthly,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(format!("Unknown {}: {s}", stringify!($ty))),
                }
            }
        }
    };
}

text_enum!(ReportType { Sales => "sales", Products => "products", Customers => "customers" });
text_enum!(ReportFormat { Csv => "csv", Html => "html", Pdf => "pdf", Excel => "excel" });
text_enum!(ReportFrequency { Daily => "daily", Weekly => "weekly", Monthly => "monthly" });

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Excel => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Html => "text/html",
            Self::Pdf => "application/pdf",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl ReportFrequency {
    /// Next run after `from`. Monthly schedules clamp to the last day of shorter months.
    pub fn next_run(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Daily => from + chrono::Duration::days(1),
            Self::Weekly => from + chrono::Duration::days(7),
            Self::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or_else(|| from + chrono::Duration::days(30)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ReportSchedule {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReportScheduleId,
    pub name: String,
    pub report_type: String,
    pub format: String,
    pub frequency: String,
    pub recipients: Vec<String>,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReportScheduleCreateDBRequest {
    pub name: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub frequency: ReportFrequency,
    pub recipients: Vec<String>,
    pub active: bool,
    pub next_run: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportScheduleUpdateDBRequest {
    pub name: Option<String>,
    pub format: Option<ReportFormat>,
    pub frequency: Option<ReportFrequency>,
    pub recipients: Option<Vec<String>>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ReportLog {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub schedule_id: ReportScheduleId,
    pub status: String,
    pub recipients: Vec<String>,
    pub file_url: Option<String>,
    pub metadata: serde_json::Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReportLogCreateDBRequest {
    pub schedule_id: ReportScheduleId,
    pub success: bool,
    pub recipients: Vec<String>,
    pub file_url: Option<String>,
    pub metadata: serde_json::Value,
    pub error: Option<String>,
}
