//! Manual email and WhatsApp sends, their delivery logs, and WhatsApp retry.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::{
        messaging::{EmailSendRequest, ListMessageLogsQuery, WhatsAppSendRequest},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{EmailLogs, WhatsAppLogs},
        models::message_logs::{EmailLog, WhatsAppLog},
    },
    email::EmailTemplate,
    errors::{Error, Result},
    settings,
    whatsapp::ResendSummary,
};

fn missing_fields() -> Error {
    Error::BadRequest {
        message: "Missing required fields".to_string(),
    }
}

fn required(value: Option<String>) -> Result<String> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(missing_fields)
}

/// Render and send one templated email. The attempt is logged whether or not delivery succeeds.
#[utoipa::path(
    post,
    path = "/email/send",
    tag = "messaging",
    request_body = EmailSendRequest,
    responses(
        (status = 200, description = "Email sent", body = EmailLog),
        (status = 400, description = "Missing fields or invalid template"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_email(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Messaging, operation::CreateAll>,
    Json(request): Json<EmailSendRequest>,
) -> Result<Json<EmailLog>> {
    let to = required(request.to)?;
    let template: EmailTemplate = required(request.template)?.parse()?;
    let data = request.data.ok_or_else(missing_fields)?;

    let log = state.email.send(&state.db, &to, &request.cc, template, &data).await?;
    Ok(Json(log))
}

#[utoipa::path(
    get,
    path = "/email/logs",
    tag = "messaging",
    params(ListMessageLogsQuery),
    responses(
        (status = 200, description = "Email delivery log", body = PaginatedResponse<EmailLog>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_email_logs(
    State(state): State<AppState>,
    Query(query): Query<ListMessageLogsQuery>,
    _: RequiresPermission<resource::Messaging, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<EmailLog>>> {
    let filter = query.filter();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = EmailLogs::new(&mut conn);
    let logs = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(logs, total, filter.skip, filter.limit)))
}

#[utoipa::path(
    post,
    path = "/whatsapp/send",
    tag = "messaging",
    request_body = WhatsAppSendRequest,
    responses(
        (status = 200, description = "Message sent", body = WhatsAppLog),
        (status = 400, description = "WhatsApp disabled, template not found or missing fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_whatsapp(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Messaging, operation::CreateAll>,
    Json(request): Json<WhatsAppSendRequest>,
) -> Result<Json<WhatsAppLog>> {
    let to = required(request.to)?;
    let template = required(request.template)?;
    let data = request.data.unwrap_or_else(|| serde_json::json!({}));

    let current = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        settings::load(&mut conn, &state.cipher).await?
    };
    let log = state
        .whatsapp
        .send(&state.db, &current.whatsapp_settings, &to, &template, &data)
        .await?;
    Ok(Json(log))
}

#[utoipa::path(
    get,
    path = "/whatsapp/logs",
    tag = "messaging",
    params(ListMessageLogsQuery),
    responses(
        (status = 200, description = "WhatsApp delivery log", body = PaginatedResponse<WhatsAppLog>),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_whatsapp_logs(
    State(state): State<AppState>,
    Query(query): Query<ListMessageLogsQuery>,
    _: RequiresPermission<resource::Messaging, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<WhatsAppLog>>> {
    let filter = query.filter();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = WhatsAppLogs::new(&mut conn);
    let logs = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(logs, total, filter.skip, filter.limit)))
}

/// Retry the failed WhatsApp messages of the last day.
#[utoipa::path(
    post,
    path = "/whatsapp/resend",
    tag = "messaging",
    responses(
        (status = 200, description = "Resend outcome", body = ResendSummary),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn resend_failed_whatsapp(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Messaging, operation::SystemAccess>,
) -> Result<Json<ResendSummary>> {
    let current = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        settings::load(&mut conn, &state.cipher).await?
    };
    let summary = state.whatsapp.resend_failed(&state.db, &current.whatsapp_settings).await?;
    Ok(Json(summary))
}
