//! Runtime settings. Secrets never leave the service unmasked, including in the audit trail.

use axum::{Json, extract::State};
use sqlx::{Acquire, PgConnection};

use crate::{
    AppState, audit,
    auth::permissions::{RequiresPermission, operation, resource},
    db::models::{
        audit_logs::AuditAction,
        settings::{NotificationSettings, PaymentSettings, WhatsAppSettings},
    },
    errors::{Error, Result},
    settings::{self, AppSettings},
    types::UserId,
};

async fn audit_change(conn: &mut PgConnection, section: &str, old: &AppSettings, new: &AppSettings, user_id: UserId) -> Result<()> {
    audit::record(
        conn,
        "settings",
        section,
        AuditAction::Update,
        Some(&old.masked()),
        Some(&new.masked()),
        Some(user_id),
    )
    .await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings with secrets masked", body = AppSettings),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Settings, operation::ReadAll>,
) -> Result<Json<AppSettings>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let current = settings::load(&mut conn, &state.cipher).await?;
    Ok(Json(current.masked()))
}

/// Replace the payment section. Sending a masked secret back keeps the stored one.
#[utoipa::path(
    put,
    path = "/settings/payment",
    tag = "settings",
    request_body = PaymentSettings,
    responses(
        (status = 200, description = "Updated settings", body = AppSettings),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_payment_settings(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Settings, operation::UpdateAll>,
    Json(request): Json<PaymentSettings>,
) -> Result<Json<AppSettings>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = settings::load(&mut *conn, &state.cipher).await?;
    let new = settings::update_payment(&mut *conn, &state.cipher, &request).await?;
    audit_change(&mut *conn, "payment_settings", &old, &new, current_user.id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(new.masked()))
}

#[utoipa::path(
    put,
    path = "/settings/whatsapp",
    tag = "settings",
    request_body = WhatsAppSettings,
    responses(
        (status = 200, description = "Updated settings", body = AppSettings),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_whatsapp_settings(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Settings, operation::UpdateAll>,
    Json(request): Json<WhatsAppSettings>,
) -> Result<Json<AppSettings>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = settings::load(&mut *conn, &state.cipher).await?;
    let new = settings::update_whatsapp(&mut *conn, &state.cipher, &request).await?;
    audit_change(&mut *conn, "whatsapp_settings", &old, &new, current_user.id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(new.masked()))
}

#[utoipa::path(
    put,
    path = "/settings/notification",
    tag = "settings",
    request_body = NotificationSettings,
    responses(
        (status = 200, description = "Updated settings", body = AppSettings),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_notification_settings(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Settings, operation::UpdateAll>,
    Json(request): Json<NotificationSettings>,
) -> Result<Json<AppSettings>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let old = settings::load(&mut *conn, &state.cipher).await?;
    let new = settings::update_notification(&mut *conn, &state.cipher, &request).await?;
    audit_change(&mut *conn, "notification_settings", &old, &new, current_user.id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(new.masked()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{admin_cookie, create_test_admin_user, create_test_server, create_test_state};
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_payment_settings_are_masked_and_kept(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let server = create_test_server(state.clone());

        let saved: Value = server
            .put("/admin/api/v1/settings/payment")
            .add_header("cookie", cookie.clone())
            .json(&json!({"primepag_token": "tok_live_123456", "webhook_secret": "whsec_987654"}))
            .await
            .json();
        assert_eq!(saved["payment_settings"]["primepag_token"], "****3456");

        // Echoing the masked value keeps the stored secret
        server
            .put("/admin/api/v1/settings/payment")
            .add_header("cookie", cookie.clone())
            .json(&json!({"primepag_token": "****3456", "webhook_secret": "****7654", "auto_expire_time": 15}))
            .await
            .assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let stored = crate::settings::load(&mut conn, &state.cipher).await.unwrap();
        assert_eq!(stored.payment_settings.primepag_token.as_deref(), Some("tok_live_123456"));
        assert_eq!(stored.payment_settings.auto_expire_time, Some(15));

        let audit: Value = server
            .get("/admin/api/v1/audit-logs")
            .add_query_param("table_name", "settings")
            .add_header("cookie", cookie)
            .await
            .json();
        assert_eq!(audit["total_count"], 2);
        assert_eq!(audit["data"][0]["new_data"]["payment_settings"]["primepag_token"], "****3456");
    }
}
