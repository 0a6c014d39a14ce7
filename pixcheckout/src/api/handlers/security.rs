//! Checkout IP blocks and the admin login audit trail.

use std::net::IpAddr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::security::{BlockIpRequest, ListBlockedIpsQuery, ListLoginAttemptsQuery},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{BlockedIps, LoginAttempts},
        models::security::{BlockedIp, BlockedIpCreateDBRequest, LoginAttempt},
    },
    errors::{Error, Result},
    types::BlockedIpId,
};

#[utoipa::path(
    get,
    path = "/security/blocked-ips",
    tag = "security",
    params(ListBlockedIpsQuery),
    responses((status = 200, description = "IP blocks, newest first", body = Vec<BlockedIp>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_blocked_ips(
    State(state): State<AppState>,
    Query(query): Query<ListBlockedIpsQuery>,
    _: RequiresPermission<resource::Security, operation::ReadAll>,
) -> Result<Json<Vec<BlockedIp>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let blocked = BlockedIps::new(&mut conn).list(query.active_only, skip, limit).await?;
    Ok(Json(blocked))
}

/// Block an address from creating checkouts.
#[utoipa::path(
    post,
    path = "/security/blocked-ips",
    tag = "security",
    request_body = BlockIpRequest,
    responses(
        (status = 201, description = "Address blocked", body = BlockedIp),
        (status = 400, description = "Invalid IP address"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn block_ip(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Security, operation::CreateAll>,
    Json(request): Json<BlockIpRequest>,
) -> Result<(StatusCode, Json<BlockedIp>)> {
    let ip: IpAddr = request.ip_address.trim().parse().map_err(|_| Error::BadRequest {
        message: "Invalid IP address".to_string(),
    })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let blocked = BlockedIps::new(&mut conn)
        .block(&BlockedIpCreateDBRequest {
            ip_address: ip.to_string(),
            reason: request.reason.filter(|r| !r.trim().is_empty()),
            expires_at: request.expires_at,
            created_by: Some(current_user.id),
        })
        .await?;

    tracing::info!(ip = %blocked.ip_address, "Blocked IP address");
    Ok((StatusCode::CREATED, Json(blocked)))
}

#[utoipa::path(
    delete,
    path = "/security/blocked-ips/{id}",
    tag = "security",
    params(("id" = String, Path, description = "Block ID")),
    responses(
        (status = 204, description = "Block lifted"),
        (status = 404, description = "Block not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(block_id = %id))]
pub async fn unblock_ip(
    State(state): State<AppState>,
    Path(id): Path<BlockedIpId>,
    _: RequiresPermission<resource::Security, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !BlockedIps::new(&mut conn).unblock(id).await? {
        return Err(Error::NotFound {
            resource: "Blocked IP".to_string(),
            id: id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/security/login-attempts",
    tag = "security",
    params(ListLoginAttemptsQuery),
    responses((status = 200, description = "Admin login attempts, newest first", body = Vec<LoginAttempt>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_login_attempts(
    State(state): State<AppState>,
    Query(query): Query<ListLoginAttemptsQuery>,
    _: RequiresPermission<resource::Security, operation::ReadAll>,
) -> Result<Json<Vec<LoginAttempt>>> {
    let (skip, limit) = query.pagination.params();
    let email = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let attempts = LoginAttempts::new(&mut conn).list(email, skip, limit).await?;
    Ok(Json(attempts))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{
        TEST_ADMIN_PASSWORD, admin_cookie, create_test_admin_user, create_test_http_server, create_test_product, create_test_server,
        create_test_state,
    };
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_blocked_ip_cannot_check_out(pool: PgPool) {
        let mut state = create_test_state(pool.clone()).await;
        // The test client connects over loopback, standing in for the reverse proxy
        state.config.trusted_proxies = vec!["127.0.0.1".parse().unwrap()];
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let product = create_test_product(&pool, Decimal::new(1000, 2)).await;
        let server = create_test_http_server(state);

        server
            .post("/admin/api/v1/security/blocked-ips")
            .add_header("cookie", cookie.clone())
            .json(&json!({"ip_address": "not-an-ip"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let blocked: Value = server
            .post("/admin/api/v1/security/blocked-ips")
            .add_header("cookie", cookie.clone())
            .json(&json!({"ip_address": "203.0.113.9", "reason": "fraude"}))
            .await
            .json();

        let checkout = json!({
            "product_id": product.id.to_string(),
            "name": "Joao Souza",
            "email": "joao@example.com",
            "document": "529.982.247-25",
            "phone": "(11) 98765-4321",
        });
        server
            .post("/api/v1/checkout")
            .add_header("x-forwarded-for", "203.0.113.9")
            .json(&checkout)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        server
            .delete(&format!("/admin/api/v1/security/blocked-ips/{}", blocked["id"].as_str().unwrap()))
            .add_header("cookie", cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .post("/api/v1/checkout")
            .add_header("x-forwarded-for", "203.0.113.9")
            .json(&checkout)
            .await
            .assert_status(StatusCode::CREATED);

        let active: Value = server
            .get("/admin/api/v1/security/blocked-ips")
            .add_query_param("active_only", "true")
            .add_header("cookie", cookie)
            .await
            .json();
        assert!(active.as_array().unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_blocked_peer_cannot_hide_behind_forwarded_for(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let product = create_test_product(&pool, Decimal::new(1000, 2)).await;
        let server = create_test_http_server(state);

        server
            .post("/admin/api/v1/security/blocked-ips")
            .add_header("cookie", cookie)
            .json(&json!({"ip_address": "127.0.0.1", "reason": "fraude"}))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post("/api/v1/checkout")
            .add_header("x-forwarded-for", "198.51.100.77")
            .json(&json!({
                "product_id": product.id.to_string(),
                "name": "Joao Souza",
                "email": "joao@example.com",
                "document": "529.982.247-25",
                "phone": "(11) 98765-4321",
            }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_attempts_are_listed(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let server = create_test_server(state);

        server
            .post("/authentication/login")
            .json(&json!({"email": admin.email, "password": "wrong-password"}))
            .await
            .assert_status_unauthorized();
        server
            .post("/authentication/login")
            .json(&json!({"email": admin.email, "password": TEST_ADMIN_PASSWORD}))
            .await
            .assert_status_ok();

        let attempts: Value = server
            .get("/admin/api/v1/security/login-attempts")
            .add_query_param("email", &admin.email)
            .add_header("cookie", cookie)
            .await
            .json();
        assert_eq!(attempts.as_array().unwrap().len(), 2);
        assert_eq!(attempts[0]["success"], true);
        assert_eq!(attempts[1]["success"], false);
    }
}
