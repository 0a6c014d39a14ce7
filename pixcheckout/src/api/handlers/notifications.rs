use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        notifications::{ListNotificationsQuery, MarkAllReadResponse},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Notifications, notifications::NotificationFilter},
        models::notifications::Notification,
    },
    errors::{Error, Result},
    types::NotificationId,
};

fn notification_not_found(id: NotificationId) -> Error {
    Error::NotFound {
        resource: "Notification".to_string(),
        id: id.to_string(),
    }
}

/// Notifications addressed to the caller plus broadcasts, newest first.
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Paginated notifications", body = PaginatedResponse<Notification>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: RequiresPermission<resource::Notifications, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<Notification>>> {
    let (skip, limit) = query.pagination.params();
    let filter = NotificationFilter {
        skip,
        limit,
        user_id: Some(current_user.id),
        unread_only: query.unread_only,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut conn);
    let notifications = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(notifications, total, skip, limit)))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(notification_id = %id))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    current_user: RequiresPermission<resource::Notifications, operation::UpdateAll>,
) -> Result<Json<Notification>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notification = Notifications::new(&mut conn)
        .mark_read(id, Some(current_user.id))
        .await?
        .ok_or_else(|| notification_not_found(id))?;
    Ok(Json(notification))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Number of notifications marked as read", body = MarkAllReadResponse),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Notifications, operation::UpdateAll>,
) -> Result<Json<MarkAllReadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Notifications::new(&mut conn).mark_all_read(Some(current_user.id)).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(notification_id = %id))]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    current_user: RequiresPermission<resource::Notifications, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Notifications::new(&mut conn).delete(id, Some(current_user.id)).await? {
        return Err(notification_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
