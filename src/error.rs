//! Unified HTTP error type.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are logged
//! and answered with a generic message; client errors carry a readable message
//! and, for validation failures, per-field details.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::auth::AuthError;
use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::domain::value_objects::{PhoneError, SessionIdError};
use crate::services::telegram::TelegramError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("validation failed")]
    Validation(BTreeMap<String, Vec<String>>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self { Self::Validation(field_messages(&errors)) }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self { Self::BadRequest(err.to_string()) }
}

impl From<SessionIdError> for AppError {
    fn from(err: SessionIdError) -> Self { Self::BadRequest(err.to_string()) }
}

impl From<PhoneError> for AppError {
    fn from(err: PhoneError) -> Self { Self::BadRequest(err.to_string()) }
}

/// Flattens validator output into `field -> [message]`, using the error code
/// when no message was attached.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), ToString::to_string))
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn cart_status(err: &CartError) -> StatusCode {
    match err {
        CartError::ItemNotFound => StatusCode::NOT_FOUND,
        CartError::ProductUnavailable { .. } | CartError::InsufficientStock { .. } => StatusCode::CONFLICT,
        CartError::Empty | CartError::Quantity(_) => StatusCode::BAD_REQUEST,
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Storage(err) => match err {
                StorageError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::Conflict(_) => StatusCode::CONFLICT,
                StorageError::Cart(cart) | StorageError::Order(OrderError::Cart(cart)) => cart_status(cart),
                StorageError::Order(OrderError::InvalidTransition { .. }) => StatusCode::CONFLICT,
                StorageError::Order(_) => StatusCode::BAD_REQUEST,
            },
            Self::Auth(err) => match err {
                AuthError::Hash(_) | AuthError::TokenCreation(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::Telegram(TelegramError::Disabled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Telegram(_) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Storage(StorageError::Database(_)) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Storage(StorageError::Conflict(_)) => "A record with the same unique value already exists".to_string(),
            Self::Auth(AuthError::Hash(_) | AuthError::TokenCreation(_)) => "Internal server error".to_string(),
            Self::Telegram(TelegramError::Disabled) => "Telegram notifications are not configured".to_string(),
            Self::Telegram(_) => "Telegram API request failed".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, error_debug = ?self, "Request error");
        }

        let body = match &self {
            Self::Validation(fields) => json!({ "error": "Validation failed", "fields": fields }),
            _ => json!({ "error": self.public_message() }),
        };
        (status, Json(body)).into_response()
    }
}
