use serde::Deserialize;
use utoipa::IntoParams;

use crate::{api::models::pagination::Pagination, db::models::audit_logs::AuditAction};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAuditLogsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Audited table, e.g. `orders`
    pub table_name: Option<String>,
    #[param(value_type = Option<String>)]
    pub action: Option<AuditAction>,
    pub record_id: Option<String>,
}
