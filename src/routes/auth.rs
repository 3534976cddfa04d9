use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, reject_unknown_user, validate_new_password, verify_password, AdminClaims, IssuedToken};
use crate::error::Result;
use crate::state::AppState;
use crate::storage::AdminUser;

// Credentials are taken verbatim; sanitizing would alter passwords.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub admin: AdminUser,
}

pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let Some(admin) = state.storage().find_admin_by_username(&request.username).await? else {
        tracing::warn!(username = %request.username, "login attempt for unknown admin");
        return Err(reject_unknown_user(&request.password).into());
    };
    if let Err(e) = verify_password(&request.password, &admin.password_hash) {
        tracing::warn!(username = %admin.username, "admin login failed");
        return Err(e.into());
    }
    state.storage().touch_admin_login(admin.id).await?;
    let token = state.jwt().issue(&admin)?;
    tracing::info!(username = %admin.username, "admin logged in");
    Ok(Json(LoginResponse { token, admin }))
}

pub async fn me(AdminClaims(claims): AdminClaims, State(state): State<AppState>) -> Result<Json<AdminUser>> {
    Ok(Json(state.storage().get_admin(claims.sub).await?))
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode> {
    let admin = state.storage().get_admin(claims.sub).await?;
    verify_password(&change.current_password, &admin.password_hash)?;
    validate_new_password(&change.new_password)?;
    let hash = hash_password(&change.new_password)?;
    state.storage().update_admin_password(admin.id, &hash).await?;
    tracing::info!(username = %admin.username, "admin password changed");
    Ok(StatusCode::NO_CONTENT)
}
