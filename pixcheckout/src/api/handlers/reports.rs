use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        reports::{DailySummaryResponse, ListReportLogsQuery, ReportScheduleCreate, ReportScheduleUpdate},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{
            ReportLogs, ReportSchedules, Repository, analytics,
            analytics::DashboardStats,
            reports::ReportScheduleFilter,
        },
        models::reports::{ReportLog, ReportSchedule, ReportScheduleCreateDBRequest},
    },
    errors::{Error, Result},
    reports,
    types::ReportScheduleId,
};

fn schedule_not_found(id: ReportScheduleId) -> Error {
    Error::NotFound {
        resource: "Report schedule".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/reports/schedules",
    tag = "reports",
    params(Pagination),
    responses(
        (status = 200, description = "Paginated report schedules", body = PaginatedResponse<ReportSchedule>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_schedules(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ReportSchedule>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ReportSchedules::new(&mut conn);
    let schedules = repo.list(&ReportScheduleFilter::new(skip, limit)).await?;
    let total = repo.count().await?;

    Ok(Json(PaginatedResponse::new(schedules, total, skip, limit)))
}

/// Create a schedule. Its first run is one period from now.
#[utoipa::path(
    post,
    path = "/reports/schedules",
    tag = "reports",
    request_body = ReportScheduleCreate,
    responses(
        (status = 201, description = "Schedule created", body = ReportSchedule),
        (status = 400, description = "Invalid schedule"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_schedule(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Reports, operation::CreateAll>,
    Json(request): Json<ReportScheduleCreate>,
) -> Result<(StatusCode, Json<ReportSchedule>)> {
    if request.name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Schedule name is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let schedule = ReportSchedules::new(&mut conn)
        .create(&ReportScheduleCreateDBRequest {
            name: request.name.trim().to_string(),
            report_type: request.report_type,
            format: request.format,
            frequency: request.frequency,
            recipients: request.recipients,
            active: request.active,
            next_run: request.frequency.next_run(Utc::now()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(schedule)))
}

#[utoipa::path(
    get,
    path = "/reports/schedules/{id}",
    tag = "reports",
    params(("id" = String, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule", body = ReportSchedule),
        (status = 404, description = "Schedule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(schedule_id = %id))]
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<ReportScheduleId>,
    _: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<ReportSchedule>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let schedule = ReportSchedules::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| schedule_not_found(id))?;
    Ok(Json(schedule))
}

#[utoipa::path(
    patch,
    path = "/reports/schedules/{id}",
    tag = "reports",
    request_body = ReportScheduleUpdate,
    params(("id" = String, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule updated", body = ReportSchedule),
        (status = 404, description = "Schedule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(schedule_id = %id))]
pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<ReportScheduleId>,
    _: RequiresPermission<resource::Reports, operation::UpdateAll>,
    Json(request): Json<ReportScheduleUpdate>,
) -> Result<Json<ReportSchedule>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let schedule = ReportSchedules::new(&mut conn).update(id, &request.into()).await?;
    Ok(Json(schedule))
}

#[utoipa::path(
    delete,
    path = "/reports/schedules/{id}",
    tag = "reports",
    params(("id" = String, Path, description = "Schedule ID")),
    responses(
        (status = 204, description = "Schedule deleted"),
        (status = 404, description = "Schedule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(schedule_id = %id))]
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<ReportScheduleId>,
    _: RequiresPermission<resource::Reports, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !ReportSchedules::new(&mut conn).delete(id).await? {
        return Err(schedule_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Generate a scheduled report now and email it to the schedule's recipients.
#[utoipa::path(
    post,
    path = "/reports/schedules/{id}/generate",
    tag = "reports",
    params(("id" = String, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Report generated", body = ReportLog),
        (status = 400, description = "Unsupported report format"),
        (status = 404, description = "Schedule not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(schedule_id = %id))]
pub async fn generate_report(
    State(state): State<AppState>,
    Path(id): Path<ReportScheduleId>,
    _: RequiresPermission<resource::Reports, operation::SystemAccess>,
) -> Result<Json<ReportLog>> {
    let log = reports::generate(&state, id).await?;
    Ok(Json(log))
}

#[utoipa::path(
    get,
    path = "/reports/logs",
    tag = "reports",
    params(ListReportLogsQuery),
    responses(
        (status = 200, description = "Report runs, newest first", body = Vec<ReportLog>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_report_logs(
    State(state): State<AppState>,
    Query(query): Query<ListReportLogsQuery>,
    _: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<Vec<ReportLog>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let logs = ReportLogs::new(&mut conn).list(query.schedule_id, skip, limit).await?;
    Ok(Json(logs))
}

#[utoipa::path(
    get,
    path = "/reports/dashboard",
    tag = "reports",
    responses(
        (status = 200, description = "Today and month-to-date sales", body = DashboardStats),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Reports, operation::ReadAll>,
) -> Result<Json<DashboardStats>> {
    let stats = analytics::dashboard_stats(&state.db).await?;
    Ok(Json(stats))
}

/// Email the last day's order figures to the configured summary recipients.
#[utoipa::path(
    post,
    path = "/reports/daily-summary",
    tag = "reports",
    responses(
        (status = 200, description = "Summary emails delivered", body = DailySummaryResponse),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_daily_summary(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Reports, operation::SystemAccess>,
) -> Result<Json<DailySummaryResponse>> {
    let sent = reports::send_daily_summary(&state).await?;
    Ok(Json(DailySummaryResponse { sent }))
}
