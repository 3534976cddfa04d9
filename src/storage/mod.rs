//! `PostgreSQL` storage layer.
//!
//! One [`Storage`] handle wraps the connection pool and exposes one method per
//! entity operation. Methods are grouped by entity in the submodules.
//!
//! ## Tables
//!
//! - `categories`, `products` - catalog
//! - `cart_items` - anonymous carts keyed by cart session
//! - `orders`, `order_items` - placed orders with price snapshots
//! - `customers` - one row per phone number, maintained at checkout
//! - `store_settings` - key/value runtime configuration
//! - `customer_activity`, `page_visits` - analytics
//! - `admin_users` - back-office logins
//!
//! Migrations live in `migrations/` and run on startup.

mod admins;
mod analytics;
mod cart;
mod categories;
mod customers;
mod orders;
mod products;
mod settings;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError};

pub use admins::AdminUser;
pub use analytics::{ActivityRecord, ActivityType, DailyRevenue, DashboardStats, NewActivity, NewVisit, StatusCount, TopProduct, Totals};
pub use customers::{Customer, CustomerWithOrders};
pub use orders::PlacedOrder;
pub use products::{ProductFilter, ProductSort};
pub use settings::{keys as setting_keys, validate_setting, Setting};

/// Default and maximum page sizes for listings.
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let what = db.constraint().unwrap_or("unique constraint").to_string();
                return Self::Conflict(what);
            }
        }
        Self::Database(err)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        let pages = (total.max(0) as u64).div_ceil(u64::from(per_page.max(1)));
        Self { data, total, page, per_page, total_pages: u32::try_from(pages).unwrap_or(u32::MAX) }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { data: self.data.into_iter().map(f).collect(), total: self.total, page: self.page, per_page: self.per_page, total_pages: self.total_pages }
    }
}

/// Normalizes `page`/`per_page` query values into `(page, per_page, offset)`.
pub fn paginate(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page, i64::from(page - 1) * i64::from(per_page))
}

/// Escapes `%`, `_` and `\` so user input matches literally inside `ILIKE`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') { escaped.push('\\'); }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }

    /// Applies pending migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Round-trips a trivial query for health checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
