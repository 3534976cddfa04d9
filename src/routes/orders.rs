use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AdminClaims;
use crate::domain::aggregates::{CheckoutRequest, Order, OrderFilter, OrderItem, OrderStatus, OrderWithItems, PaymentMethod};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::Phone;
use crate::error::{AppError, Result};
use crate::middleware::ValidJson;
use crate::state::AppState;
use crate::storage::Page;

pub async fn checkout(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let policy = state.storage().shipping_policy().await?;
    let placed = state.storage().place_order(&request, &policy).await?;

    let events = state.events();
    events.publish(placed.order.created_event());
    events.publish_all(placed.low_stock.iter().map(|p| {
        DomainEvent::Product(ProductEvent::LowStock { product_id: p.id, name: p.name.clone(), stock: p.stock })
    }));

    Ok((StatusCode::CREATED, Json(placed.order)))
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub phone: Option<String>,
}

/// Public tracking payload; leaves out the delivery address and contact details.
#[derive(Debug, Serialize)]
pub struct TrackedOrder {
    pub order_number: String,
    pub status: OrderStatus,
    pub status_label_ar: &'static str,
    pub payment_method: PaymentMethod,
    pub city: String,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderWithItems> for TrackedOrder {
    fn from(OrderWithItems { order, items }: OrderWithItems) -> Self {
        Self {
            status_label_ar: order.status.label_ar(),
            order_number: order.order_number,
            status: order.status,
            payment_method: order.payment_method,
            city: order.city,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

pub async fn track_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<TrackedOrder>> {
    let phone = query
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("phone is required to track an order".to_string()))?;
    let phone = Phone::parse(phone)?;
    let order = state.storage().find_order_for_tracking(&order_number, &phone).await?;
    Ok(Json(order.into()))
}

// Admin

pub async fn list_orders(_admin: AdminClaims, State(state): State<AppState>, Query(filter): Query<OrderFilter>) -> Result<Json<Page<Order>>> {
    Ok(Json(state.storage().list_orders(&filter).await?))
}

pub async fn get_order(_admin: AdminClaims, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderWithItems>> {
    Ok(Json(state.storage().get_order(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub async fn update_status(
    AdminClaims(admin): AdminClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<OrderWithItems>> {
    let (order, previous) = state.storage().update_order_status(id, update.status).await?;
    tracing::info!(admin = %admin.username, order_number = %order.order.order_number, "order status updated by admin");
    state.events().publish(order.status_event(previous));
    Ok(Json(order))
}

pub async fn delete_order(AdminClaims(admin): AdminClaims, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.storage().delete_order(id).await?;
    tracing::info!(admin = %admin.username, order_id = %id, "order deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
