//! HTTP routes.
//!
//! # Public
//!
//! - `GET /health`
//! - `/api/categories`, `/api/products`, `/api/cart/:session`
//! - `POST /api/checkout`, `GET /api/orders/track/:order_number`
//! - `/api/settings`, `/api/analytics/*`
//!
//! # Admin
//!
//! Everything under `/api/admin` except `login` requires a bearer token.

mod analytics;
mod auth;
mod cart;
mod categories;
mod customers;
mod orders;
mod products;
mod settings;
mod telegram;

pub use products::{ProductView, SESSION_HEADER};

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, security_headers_middleware};
use crate::state::AppState;

/// Liveness plus a database round trip.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy", "service": "souq-storefront", "database": "up" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "service": "souq-storefront", "database": "down" })),
            )
        }
    }
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(categories::list_categories))
        .route("/api/categories/:slug", get(categories::get_category))
        .route("/api/products", get(products::list_products))
        .route("/api/products/brands", get(products::list_brands))
        .route("/api/products/slug/:slug", get(products::get_product_by_slug))
        .route("/api/products/:id", get(products::get_product))
        .route("/api/products/:id/related", get(products::related_products))
        .route("/api/cart/:session", get(cart::get_cart).post(cart::add_to_cart).delete(cart::clear_cart))
        .route("/api/cart/:session/items/:item_id", patch(cart::update_item).delete(cart::remove_item))
        .route("/api/checkout", post(orders::checkout))
        .route("/api/orders/track/:order_number", get(orders::track_order))
        .route("/api/settings", get(settings::get_settings))
        .route("/api/settings/:key", get(settings::get_setting))
        .route("/api/analytics/activity", post(analytics::record_activity))
        .route("/api/analytics/visit", post(analytics::record_visit))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/me", get(auth::me))
        .route("/api/admin/password", put(auth::change_password))
        .route("/api/admin/products", get(products::admin_list_products).post(products::create_product))
        .route(
            "/api/admin/products/:id",
            get(products::admin_get_product)
                .put(products::replace_product)
                .patch(products::patch_product)
                .delete(products::delete_product),
        )
        .route("/api/admin/categories", post(categories::create_category))
        .route("/api/admin/categories/:id", put(categories::update_category).delete(categories::delete_category))
        .route("/api/admin/orders", get(orders::list_orders))
        .route("/api/admin/orders/:id", get(orders::get_order).delete(orders::delete_order))
        .route("/api/admin/orders/:id/status", patch(orders::update_status))
        .route("/api/admin/customers", get(customers::list_customers))
        .route("/api/admin/customers/:id", get(customers::get_customer))
        .route("/api/admin/settings", put(settings::update_settings))
        .route("/api/admin/settings/:key", put(settings::put_setting).delete(settings::delete_setting))
        .route("/api/admin/analytics", get(analytics::dashboard))
        .route("/api/admin/activity", get(analytics::recent_activity))
        .route("/api/admin/telegram/test", post(telegram::send_test))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, HeaderName::from_static(SESSION_HEADER)])
}

/// Builds the application router with all middleware applied.
pub fn router(state: AppState) -> Router {
    let rate_limited = state.config().rate_limit_enabled;

    let mut login = Router::new().route("/api/admin/login", post(auth::login));
    if rate_limited {
        if let Some(limiter) = auth_rate_limiter() {
            login = login.layer(limiter);
        }
    }

    let mut api = public_routes().merge(admin_routes()).merge(login);
    if rate_limited {
        if let Some(limiter) = api_rate_limiter() {
            api = api.layer(limiter);
        }
    }

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config().cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
