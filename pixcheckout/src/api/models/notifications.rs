use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::api::models::pagination::Pagination;

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListNotificationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}
