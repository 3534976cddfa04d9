use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::analytics::track_activity;
use crate::domain::aggregates::{Cart, CartLine, CartSummary};
use crate::domain::value_objects::{CartSessionId, Quantity};
use crate::error::{AppError, Result};
use crate::middleware::ValidJson;
use crate::state::AppState;
use crate::storage::ActivityType;

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub session_id: String,
    pub items: Vec<CartLine>,
    pub summary: CartSummary,
}

fn default_quantity() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCart {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 99))]
    pub quantity: u32,
}

/// Zero removes the line.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantity {
    #[validate(range(max = 99))]
    pub quantity: u32,
}

async fn respond(state: &AppState, cart: Cart) -> Result<Json<CartResponse>> {
    let policy = state.storage().shipping_policy().await?;
    let summary = cart.summary(&policy);
    Ok(Json(CartResponse { session_id: cart.session_id, items: cart.lines, summary }))
}

pub async fn get_cart(State(state): State<AppState>, Path(session): Path<String>) -> Result<Json<CartResponse>> {
    let session = CartSessionId::parse(session)?;
    let cart = state.storage().get_cart(&session).await?;
    respond(&state, cart).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Path(session): Path<String>,
    ValidJson(body): ValidJson<AddToCart>,
) -> Result<Json<CartResponse>> {
    let session = CartSessionId::parse(session)?;
    let quantity = Quantity::new(body.quantity).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let cart = state.storage().add_to_cart(&session, body.product_id, quantity).await?;
    track_activity(&state, session.as_str(), ActivityType::AddToCart, Some(body.product_id));
    respond(&state, cart).await
}

pub async fn update_item(
    State(state): State<AppState>,
    Path((session, item_id)): Path<(String, Uuid)>,
    ValidJson(body): ValidJson<UpdateQuantity>,
) -> Result<Json<CartResponse>> {
    let session = CartSessionId::parse(session)?;
    let cart = state.storage().update_cart_item(&session, item_id, body.quantity).await?;
    respond(&state, cart).await
}

pub async fn remove_item(State(state): State<AppState>, Path((session, item_id)): Path<(String, Uuid)>) -> Result<Json<CartResponse>> {
    let session = CartSessionId::parse(session)?;
    let cart = state.storage().remove_cart_item(&session, item_id).await?;
    respond(&state, cart).await
}

pub async fn clear_cart(State(state): State<AppState>, Path(session): Path<String>) -> Result<StatusCode> {
    let session = CartSessionId::parse(session)?;
    state.storage().clear_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
