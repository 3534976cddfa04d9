use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::AdminClaims;
use crate::domain::aggregates::{Category, CategoryInput};
use crate::error::Result;
use crate::middleware::ValidJson;
use crate::state::AppState;

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.storage().list_categories().await?))
}

pub async fn get_category(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Category>> {
    Ok(Json(state.storage().get_category_by_slug(&slug).await?))
}

pub async fn create_category(
    _admin: AdminClaims,
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.storage().create_category(&input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<CategoryInput>,
) -> Result<Json<Category>> {
    Ok(Json(state.storage().update_category(id, &input).await?))
}

/// Products in the category become uncategorized.
pub async fn delete_category(_admin: AdminClaims, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.storage().delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
