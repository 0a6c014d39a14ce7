//! Admin sessions: signed JWTs carried in an HttpOnly cookie or a bearer header.
//!
//! Tokens are HS256 signed with `secret_key` and carry the issuer `pixcheckout`, so a token
//! minted by another service sharing the key is still rejected.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{api::models::users::CurrentUser, config::Config, errors::Error, types::UserId};

const ISSUER: &str = "pixcheckout";

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            is_admin: user.is_admin,
            iss: ISSUER.to_string(),
            exp: (now + config.auth.security.jwt_expiry).timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            display_name: claims.display_name,
            is_admin: claims.is_admin,
        }
    }
}

fn signing_secret(config: &Config) -> Result<&[u8], Error> {
    config
        .secret_key
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| Error::Internal {
            operation: "sign session: secret_key is not configured".to_string(),
        })
}

pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let key = EncodingKey::from_secret(signing_secret(config)?);
    encode(&Header::default(), &SessionClaims::new(user, config), &key).map_err(|e| Error::Internal {
        operation: format!("create session token: {e}"),
    })
}

/// Token problems the caller can fix by logging in again. Everything else is a server fault.
fn is_client_error(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
    )
}

pub fn verify_session_token(token: &str, config: &Config) -> Result<CurrentUser, Error> {
    let key = DecodingKey::from_secret(signing_secret(config)?);
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| {
        if is_client_error(e.kind()) {
            Error::Unauthenticated { message: None }
        } else {
            Error::Internal {
                operation: format!("verify session token: {e}"),
            }
        }
    })?;

    Ok(data.claims.into())
}

fn cookie_attributes(config: &Config, max_age_secs: u64) -> String {
    let session = &config.auth.native.session;
    format!(
        "Path=/; HttpOnly;{} SameSite={}; Max-Age={max_age_secs}",
        if session.cookie_secure { " Secure;" } else { "" },
        session.cookie_same_site
    )
}

/// `Set-Cookie` value carrying `token` for the configured session lifetime.
pub fn session_cookie(token: &str, config: &Config) -> String {
    let session = &config.auth.native.session;
    format!("{}={token}; {}", session.cookie_name, cookie_attributes(config, session.timeout.as_secs()))
}

/// `Set-Cookie` value that makes the browser drop the session.
pub fn cleared_session_cookie(config: &Config) -> String {
    format!("{}=; {}", config.auth.native.session.cookie_name, cookie_attributes(config, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn config() -> Config {
        let mut config = Config {
            secret_key: Some("session-test-secret".to_string()),
            ..Default::default()
        };
        config.auth.security.jwt_expiry = Duration::from_secs(3600);
        config.auth.native.session.cookie_secure = false;
        config
    }

    fn admin() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "admin@loja.com.br".to_string(),
            display_name: Some("Loja Admin".to_string()),
            is_admin: true,
        }
    }

    fn sign(claims: &SessionClaims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_token_carries_admin_identity() {
        let config = config();
        let user = admin();

        let token = create_session_token(&user, &config).unwrap();
        let verified = verify_session_token(&token, &config).unwrap();

        assert_eq!(verified.id, user.id);
        assert_eq!(verified.email, "admin@loja.com.br");
        assert_eq!(verified.display_name.as_deref(), Some("Loja Admin"));
        assert!(verified.is_admin);
    }

    #[test]
    fn test_rejects_token_signed_with_other_key() {
        let mut config = config();
        let token = create_session_token(&admin(), &config).unwrap();

        config.secret_key = Some("rotated-secret".to_string());
        let err = verify_session_token(&token, &config).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_rejects_expired_and_foreign_tokens() {
        let config = config();
        let mut claims = SessionClaims::new(&admin(), &config);
        claims.exp = (Utc::now() - chrono::Duration::hours(1)).timestamp();
        let expired = sign(&claims, "session-test-secret");
        assert!(matches!(
            verify_session_token(&expired, &config).unwrap_err(),
            Error::Unauthenticated { .. }
        ));

        let mut claims = SessionClaims::new(&admin(), &config);
        claims.iss = "another-service".to_string();
        let foreign = sign(&claims, "session-test-secret");
        assert!(matches!(
            verify_session_token(&foreign, &config).unwrap_err(),
            Error::Unauthenticated { .. }
        ));
    }

    #[test]
    fn test_garbage_tokens_are_unauthenticated() {
        let config = config();
        for token in ["", "invalid", "not.a.token", "too.many.parts.in.this.token"] {
            assert!(
                matches!(verify_session_token(token, &config).unwrap_err(), Error::Unauthenticated { .. }),
                "token {token:?} should be rejected as unauthenticated"
            );
        }
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let mut config = config();
        config.secret_key = None;
        assert!(matches!(
            create_session_token(&admin(), &config).unwrap_err(),
            Error::Internal { .. }
        ));
    }

    #[test]
    fn test_cookie_values() {
        let mut config = config();
        let cookie = session_cookie("abc", &config);
        assert!(cookie.starts_with("pixcheckout_session=abc; Path=/; HttpOnly;"));
        assert!(cookie.ends_with(&format!("Max-Age={}", config.auth.native.session.timeout.as_secs())));
        assert!(!cookie.contains("Secure"));

        config.auth.native.session.cookie_secure = true;
        let cleared = cleared_session_cookie(&config);
        assert!(cleared.starts_with("pixcheckout_session=;"));
        assert!(cleared.contains("Secure;"));
        assert!(cleared.ends_with("Max-Age=0"));
    }
}
