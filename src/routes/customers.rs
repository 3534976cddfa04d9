use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminClaims;
use crate::error::Result;
use crate::state::AppState;
use crate::storage::{Customer, CustomerWithOrders, Page};

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_customers(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Page<Customer>>> {
    let page = state.storage().list_customers(query.search.as_deref(), query.page, query.per_page).await?;
    Ok(Json(page))
}

pub async fn get_customer(_admin: AdminClaims, State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CustomerWithOrders>> {
    Ok(Json(state.storage().get_customer_with_orders(id).await?))
}
