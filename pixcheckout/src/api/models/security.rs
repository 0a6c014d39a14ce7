use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::api::models::pagination::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlockIpRequest {
    pub ip_address: String,
    pub reason: Option<String>,
    /// Block is permanent when absent
    pub expires_at: Option<DateTime<Utc>>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListBlockedIpsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Only blocks that are active and unexpired
    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub active_only: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListLoginAttemptsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub email: Option<String>,
}
