use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::{audit_logs::ListAuditLogsQuery, pagination::PaginatedResponse},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::AuditLogs,
        models::audit_logs::{AuditLog, AuditLogFilter},
    },
    errors::{Error, Result},
};

#[utoipa::path(
    get,
    path = "/audit-logs",
    tag = "audit",
    params(ListAuditLogsQuery),
    responses(
        (status = 200, description = "Paginated audit entries, newest first", body = PaginatedResponse<AuditLog>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<ListAuditLogsQuery>,
    _: RequiresPermission<resource::AuditLogs, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<AuditLog>>> {
    let (skip, limit) = query.pagination.params();
    let filter = AuditLogFilter {
        skip,
        limit,
        table_name: query.table_name,
        action: query.action,
        record_id: query.record_id,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = AuditLogs::new(&mut conn);
    let entries = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(entries, total, skip, limit)))
}
