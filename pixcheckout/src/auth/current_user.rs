use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};

/// Session token from the configured cookie.
fn session_cookie<'a>(headers: &'a HeaderMap, config: &Config) -> Option<&'a str> {
    let cookie_name = &config.auth.native.session.cookie_name;
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Session token passed as `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<Result<&str>> {
    let value = headers.get(header::AUTHORIZATION)?;
    let value = match value.to_str() {
        Ok(v) => v,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };
    value.strip_prefix("Bearer ").map(|token| Ok(token.trim()))
}

/// Resolve the caller from the request headers.
///
/// The session cookie is tried first; an invalid cookie does not prevent a valid bearer token
/// from authenticating.
pub fn authenticate(headers: &HeaderMap, config: &Config) -> Result<CurrentUser> {
    let mut last_error = None;

    if let Some(token) = session_cookie(headers, config) {
        match session::verify_session_token(token, config) {
            Ok(user) => {
                trace!(user_id = %user.id, "Authenticated via session cookie");
                return Ok(user);
            }
            Err(e) => {
                debug!("Session cookie rejected: {e}");
                last_error = Some(e);
            }
        }
    }

    if let Some(token) = bearer_token(headers) {
        match session::verify_session_token(token?, config) {
            Ok(user) => {
                trace!(user_id = %user.id, "Authenticated via bearer token");
                return Ok(user);
            }
            Err(e) => {
                debug!("Bearer token rejected: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(Error::Internal { operation }) => Error::Internal { operation },
        _ => Error::Unauthenticated { message: None },
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        authenticate(&parts.headers, &state.config)
    }
}
