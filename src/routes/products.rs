use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::analytics::track_activity;
use crate::auth::AdminClaims;
use crate::domain::aggregates::{Product, ProductInput, ProductPatch};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::CartSessionId;
use crate::error::{AppError, Result};
use crate::middleware::ValidJson;
use crate::state::AppState;
use crate::storage::{ActivityType, Page, ProductFilter, StorageError};

pub const SESSION_HEADER: &str = "x-session-id";

const DEFAULT_RELATED: i64 = 8;
const MAX_RELATED: i64 = 24;

/// Product as served to clients, with derived display flags.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub discount_percent: Option<u32>,
    pub in_stock: bool,
    pub low_stock: bool,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            discount_percent: product.discount_percent(),
            in_stock: product.stock > 0,
            low_stock: product.stock > 0 && product.is_low_stock(),
            product,
        }
    }
}

fn session_from_headers(headers: &HeaderMap) -> Option<CartSessionId> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).and_then(|s| CartSessionId::parse(s.trim()).ok())
}

fn active_or_not_found(product: Product) -> Result<Product> {
    if product.is_active { Ok(product) } else { Err(StorageError::NotFound("product").into()) }
}

pub async fn list_products(State(state): State<AppState>, Query(mut filter): Query<ProductFilter>) -> Result<Json<Page<ProductView>>> {
    filter.include_inactive = false;
    let page = state.storage().list_products(&filter).await?;
    Ok(Json(page.map(ProductView::from)))
}

pub async fn list_brands(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.storage().list_brands().await?))
}

pub async fn get_product(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<ProductView>> {
    let product = active_or_not_found(state.storage().get_product(id).await?)?;
    if let Some(session) = session_from_headers(&headers) {
        track_activity(&state, session.as_str(), ActivityType::View, Some(product.id));
    }
    Ok(Json(product.into()))
}

pub async fn get_product_by_slug(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>> {
    let product = state.storage().get_product_by_slug(&slug).await?;
    if let Some(session) = session_from_headers(&headers) {
        track_activity(&state, session.as_str(), ActivityType::View, Some(product.id));
    }
    Ok(Json(product.into()))
}

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<i64>,
}

pub async fn related_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<ProductView>>> {
    let product = active_or_not_found(state.storage().get_product(id).await?)?;
    let limit = query.limit.unwrap_or(DEFAULT_RELATED).clamp(1, MAX_RELATED);
    let related = state.storage().related_products(&product, limit).await?;
    Ok(Json(related.into_iter().map(ProductView::from).collect()))
}

// Admin

pub async fn admin_list_products(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Page<ProductView>>> {
    filter.include_inactive = true;
    let page = state.storage().list_products(&filter).await?;
    Ok(Json(page.map(ProductView::from)))
}

pub async fn admin_get_product(_admin: AdminClaims, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductView>> {
    Ok(Json(state.storage().get_product(id).await?.into()))
}

pub async fn create_product(
    AdminClaims(admin): AdminClaims,
    State(state): State<AppState>,
    ValidJson(input): ValidJson<ProductInput>,
) -> Result<(StatusCode, Json<ProductView>)> {
    input.check()?;
    let product = state.storage().create_product(&input).await?;
    tracing::info!(admin = %admin.username, product_id = %product.id, "product created by admin");
    state.events().publish(DomainEvent::Product(ProductEvent::Created { product_id: product.id, name: product.name.clone() }));
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn replace_product(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<ProductInput>,
) -> Result<Json<ProductView>> {
    input.check()?;
    Ok(Json(state.storage().update_product(id, &input).await?.into()))
}

pub async fn patch_product(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(patch): ValidJson<ProductPatch>,
) -> Result<Json<ProductView>> {
    let current = state.storage().get_product(id).await?;
    let input = current.apply_patch(patch);
    input.validate().map_err(AppError::from)?;
    input.check()?;
    Ok(Json(state.storage().update_product(id, &input).await?.into()))
}

pub async fn delete_product(AdminClaims(admin): AdminClaims, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.storage().delete_product(id).await?;
    tracing::info!(admin = %admin.username, product_id = %id, "product deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
