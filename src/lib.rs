//! Souq Storefront
//!
//! Arabic-first storefront and back-office API for a watch and perfume shop.
//!
//! ## Features
//! - Bilingual product catalog with categories, brands and filters
//! - Anonymous carts keyed by a client-generated cart session
//! - Cash-on-delivery checkout, order tracking and order management
//! - Key/value store settings driving storefront content
//! - Visitor and customer-activity analytics
//! - JWT-protected admin API
//! - New-order notifications to Telegram and domain events to NATS

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use routes::router;
pub use state::AppState;
pub use storage::Storage;
