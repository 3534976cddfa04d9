//! Back-office authentication.
//!
//! Admin passwords are stored as Argon2id PHC strings. A successful login
//! yields an HS256 JWT that admin routes accept as `Authorization: Bearer`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::{AdminUser, Storage};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Checked against on unknown usernames so every login attempt costs one Argon2 run.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$7an+glEHMBdGK+trIj5d5A$QfZAVgalfXjVp5E3ImnG1EjuCrI0vAaPa8cIHrj+vgk";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    WeakPassword(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token creation failed: {0}")]
    TokenCreation(String),
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Verify a password for a username that does not exist. Always fails.
pub fn reject_unknown_user(password: &str) -> AuthError {
    let _ = verify_password(password, DUMMY_PASSWORD_HASH);
    AuthError::InvalidCredentials
}

pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!("password must be at least {MIN_PASSWORD_LENGTH} characters")));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Admin user id.
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &SecretString, ttl_hours: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self { encoding: EncodingKey::from_secret(bytes), decoding: DecodingKey::from_secret(bytes), ttl: Duration::hours(ttl_hours) }
    }

    pub fn from_config(config: &AuthConfig) -> Self { Self::new(&config.jwt_secret, config.jwt_ttl_hours) }

    pub fn issue(&self, admin: &AdminUser) -> Result<IssuedToken, AuthError> {
        self.issue_at(admin.id, &admin.username, Utc::now())
    }

    fn issue_at(&self, id: Uuid, username: &str, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims { sub: id, username: username.to_string(), iat: now.timestamp(), exp: expires_at.timestamp() };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;
        Ok(IssuedToken { token, token_type: "Bearer", expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected admin token");
                AuthError::InvalidToken
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extractor that requires a valid admin token.
///
/// ```rust,ignore
/// async fn handler(AdminClaims(claims): AdminClaims) -> String {
///     format!("hello {}", claims.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AdminClaims(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let claims = state.jwt().verify(token)?;
        Ok(Self(claims))
    }
}

/// Creates the configured first admin when the table is empty.
pub async fn bootstrap_admin(storage: &Storage, config: &AuthConfig) -> Result<Option<AdminUser>, AppError> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(None);
    };
    if storage.count_admins().await? > 0 {
        tracing::debug!("admin users exist, skipping bootstrap");
        return Ok(None);
    }
    let hash = hash_password(password.expose_secret())?;
    let admin = storage.create_admin(username, &hash).await?;
    tracing::info!(username = %admin.username, "bootstrap admin created");
    Ok(Some(admin))
}
