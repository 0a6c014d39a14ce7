use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        backups::{BackupCreateRequest, RestoreRequest},
        pagination::Pagination,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{handlers::Backups, models::backups::BackupLog},
    errors::{Error, Result},
    storage::backups::{self, BackupResult},
};

#[utoipa::path(
    post,
    path = "/backups",
    tag = "backups",
    request_body = BackupCreateRequest,
    responses(
        (status = 201, description = "Backup written to the backups bucket", body = BackupResult),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_backup(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Backups, operation::SystemAccess>,
    Json(request): Json<BackupCreateRequest>,
) -> Result<(StatusCode, Json<BackupResult>)> {
    let result = backups::create_backup(&state, &request.tables).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[utoipa::path(
    get,
    path = "/backups/logs",
    tag = "backups",
    params(Pagination),
    responses((status = 200, description = "Backup and restore history, newest first", body = Vec<BackupLog>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_backup_logs(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::Backups, operation::ReadAll>,
) -> Result<Json<Vec<BackupLog>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let logs = Backups::new(&mut conn).list_logs(skip, limit).await?;
    Ok(Json(logs))
}

/// Restore a backup previously written by this service.
#[utoipa::path(
    post,
    path = "/backups/restore",
    tag = "backups",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Backup restored", body = BackupLog),
        (status = 400, description = "Invalid backup document"),
        (status = 404, description = "Backup not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_name = %request.file_name))]
pub async fn restore_backup(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Backups, operation::SystemAccess>,
    Json(request): Json<RestoreRequest>,
) -> Result<Json<BackupLog>> {
    let file_name = request.file_name.trim();
    if file_name.is_empty() || file_name.contains(['/', '\\']) {
        return Err(Error::BadRequest {
            message: "Invalid backup file name".to_string(),
        });
    }
    let log = backups::restore_stored(&state, file_name).await?;
    Ok(Json(log))
}

/// Restore from an uploaded backup document (multipart `file` part).
#[utoipa::path(
    post,
    path = "/backups/restore/upload",
    tag = "backups",
    request_body(content_type = "multipart/form-data", description = "Backup JSON document"),
    responses(
        (status = 200, description = "Backup restored", body = BackupLog),
        (status = 400, description = "Invalid backup document"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn restore_uploaded_backup(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Backups, operation::SystemAccess>,
    mut multipart: Multipart,
) -> Result<Json<BackupLog>> {
    let invalid = |e: axum::extract::multipart::MultipartError| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_string);
            let content = field.bytes().await.map_err(invalid)?;
            let log = backups::restore(&state, file_name, &content).await?;
            return Ok(Json(log));
        }
    }

    Err(Error::BadRequest {
        message: "No file provided".to_string(),
    })
}
