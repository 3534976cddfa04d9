use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::AdminClaims;
use crate::error::{AppError, Result};
use crate::middleware::ValidJson;
use crate::state::AppState;
use crate::storage::{validate_setting, Setting};

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<BTreeMap<String, String>>> {
    Ok(Json(state.storage().get_settings().await?))
}

pub async fn get_setting(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<Setting>> {
    Ok(Json(state.storage().get_setting(&key).await?))
}

/// Bulk update body: a flat `{ "key": "value" }` object.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct SettingsUpdate(pub BTreeMap<String, String>);

impl Validate for SettingsUpdate {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.0.is_empty() {
            errors.add("settings", ValidationError::new("empty"));
        }
        for (key, value) in &self.0 {
            if let Err(message) = validate_setting(key, value) {
                let mut error = ValidationError::new("invalid_setting");
                error.message = Some(message.into());
                errors.add("settings", error);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub async fn update_settings(
    AdminClaims(admin): AdminClaims,
    State(state): State<AppState>,
    ValidJson(update): ValidJson<SettingsUpdate>,
) -> Result<Json<BTreeMap<String, String>>> {
    let settings = state.storage().upsert_settings(&update.0).await?;
    tracing::info!(admin = %admin.username, keys = ?update.0.keys().collect::<Vec<_>>(), "settings updated by admin");
    Ok(Json(settings))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SettingValue {
    #[validate(length(max = 20000))]
    pub value: String,
}

pub async fn put_setting(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(key): Path<String>,
    ValidJson(body): ValidJson<SettingValue>,
) -> Result<Json<Setting>> {
    validate_setting(&key, &body.value).map_err(AppError::BadRequest)?;
    Ok(Json(state.storage().upsert_setting(&key, &body.value).await?))
}

pub async fn delete_setting(_admin: AdminClaims, State(state): State<AppState>, Path(key): Path<String>) -> Result<StatusCode> {
    state.storage().delete_setting(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_update_validation() {
        let ok: SettingsUpdate = serde_json::from_value(serde_json::json!({
            "store_name_ar": "متجر الساعات",
            "shipping_cost": "30",
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad: SettingsUpdate = serde_json::from_value(serde_json::json!({
            "theme_primary_color": "red",
            "Bad Key": "x",
        }))
        .unwrap();
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.field_errors()["settings"].len(), 2);

        let empty: SettingsUpdate = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.validate().is_err());
    }
}
