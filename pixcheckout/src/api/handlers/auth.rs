use axum::{Json, extract::State};

use crate::{
    AppState,
    api::{
        handlers::ClientIp,
        models::{
            auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse},
            users::{CurrentUser, UserResponse},
        },
    },
    auth::{password, session},
    db::handlers::{LoginAttempts, Users},
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<LoginRequest>,
) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    let email = request.email.trim().to_lowercase();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_user_by_email(&email).await?;

    let verified = match user.as_ref().and_then(|u| u.password_hash.clone()) {
        Some(hash) => {
            // Argon2 is CPU bound
            let password = request.password.clone();
            tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
                .await
                .map_err(|e| Error::Internal {
                    operation: format!("spawn password verification task: {e}"),
                })??
        }
        None => false,
    };

    LoginAttempts::new(&mut conn).record(&email, Some(&ip), verified).await?;

    let user = match user {
        Some(user) if verified && user.is_admin => user,
        _ => {
            tracing::info!(ip = %ip, "Failed login attempt");
            return Err(invalid_credentials());
        }
    };
    Users::new(&mut conn).record_login(user.id).await?;

    let user_response = UserResponse::from(user);
    let current_user: CurrentUser = user_response.clone().into();
    let token = session::create_session_token(&current_user, &state.config)?;

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: user_response,
            message: "Login successful".to_string(),
        },
        cookie: session::session_cookie(&token, &state.config),
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::cleared_session_cookie(&state.config),
    })
}

/// The authenticated admin.
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}
