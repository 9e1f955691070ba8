use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use password_hash::rand_core::OsRng;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::{Role, UserStatus},
    repository::{RepositoryState, UserRepository},
};

/// Claims
///
/// The payload signed into every access token. `role` is informational; the extractor
/// reloads the user so a role or status change takes effect immediately.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    pub role: Role,
    /// Issued at (seconds since the epoch).
    pub iat: usize,
    /// Expiry (seconds since the epoch).
    pub exp: usize,
}

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// issue_token
///
/// Signs an HS256 token for the user, valid for `jwt_expires_in_hours`.
pub fn issue_token(user_id: Uuid, role: Role, config: &AppConfig) -> AppResult<String> {
    let now = Utc::now();
    let expires = now + Duration::hours(config.jwt_expires_in_hours);
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp() as usize,
        exp: expires.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an argument
/// and use `require` for role checks and `id` for ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden("Insufficient permissions"))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn unauthorized(message: &str) -> AppError {
    AppError::Unauthorized(message.to_string())
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user is
///    accepted without a token.
/// 2. Bearer token: decoded with the configured secret, `exp` always validated.
/// 3. Lookup: the user must still exist and be `active`.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let bypass_id = (config.env == Env::Local)
            .then(|| parts.headers.get("x-user-id"))
            .flatten()
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());

        let user_id = match bypass_id {
            Some(id) => id,
            None => {
                let token = parts
                    .headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .ok_or_else(|| unauthorized("Access token required"))?;

                let mut validation = Validation::default();
                validation.validate_exp = true;

                let decoded = decode::<Claims>(
                    token,
                    &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
                    &validation,
                )
                .map_err(|e| match e.kind() {
                    ErrorKind::ExpiredSignature => unauthorized("Token expired"),
                    _ => unauthorized("Invalid token"),
                })?;
                decoded.claims.sub
            }
        };

        let user = repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| unauthorized("Invalid token"))?;

        if user.status != UserStatus::Active {
            tracing::warn!(user_id = %user.id, status = ?user.status, "rejected inactive account");
            return Err(unauthorized("Account is not active"));
        }

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}
