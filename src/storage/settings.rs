use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Storage, StorageError, StorageResult};
use crate::domain::aggregates::ShippingPolicy;

/// Well-known setting keys read by the storefront and back office.
pub mod keys {
    pub const STORE_NAME: &str = "store_name";
    pub const STORE_NAME_AR: &str = "store_name_ar";
    pub const CONTACT_PHONE: &str = "contact_phone";
    pub const CONTACT_WHATSAPP: &str = "contact_whatsapp";
    pub const CONTACT_EMAIL: &str = "contact_email";
    pub const SHIPPING_COST: &str = "shipping_cost";
    pub const FREE_SHIPPING_THRESHOLD: &str = "free_shipping_threshold";
    pub const PRIMARY_COLOR: &str = "theme_primary_color";
    pub const SECONDARY_COLOR: &str = "theme_secondary_color";
    pub const ACCENT_COLOR: &str = "theme_accent_color";
    pub const RETURN_POLICY: &str = "return_policy";
    pub const PRIVACY_POLICY: &str = "privacy_policy";
    pub const ANNOUNCEMENT: &str = "announcement_bar";

    pub(crate) const MONEY: &[&str] = &[SHIPPING_COST, FREE_SHIPPING_THRESHOLD];
    pub(crate) const COLORS: &[&str] = &[PRIMARY_COLOR, SECONDARY_COLOR, ACCENT_COLOR];
}

const MAX_VALUE_LEN: usize = 20_000;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Checks key syntax and, for known typed keys, the value format.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    if key.is_empty() || key.len() > 64 || !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.') {
        return Err(format!("invalid setting key {key:?}"));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(format!("value for {key} is too long"));
    }
    if keys::MONEY.contains(&key) && !value.is_empty() {
        match value.trim().parse::<Decimal>() {
            Ok(v) if v >= Decimal::ZERO => {}
            _ => return Err(format!("{key} must be a non-negative amount")),
        }
    }
    if keys::COLORS.contains(&key) {
        let hex = value.strip_prefix('#').unwrap_or("");
        if !(hex.len() == 6 || hex.len() == 3) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("{key} must be a hex colour like #1a2b3c"));
        }
    }
    Ok(())
}

fn parse_amount(value: Option<&String>) -> Option<Decimal> {
    value.and_then(|v| v.trim().parse::<Decimal>().ok()).filter(|v| *v >= Decimal::ZERO)
}

pub(crate) fn shipping_policy_from(settings: &BTreeMap<String, String>) -> ShippingPolicy {
    ShippingPolicy {
        flat_rate: parse_amount(settings.get(keys::SHIPPING_COST)).unwrap_or(Decimal::ZERO),
        free_threshold: parse_amount(settings.get(keys::FREE_SHIPPING_THRESHOLD)).filter(|v| !v.is_zero()),
    }
}

impl Storage {
    pub async fn get_settings(&self) -> StorageResult<BTreeMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM store_settings")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn get_setting(&self, key: &str) -> StorageResult<Setting> {
        sqlx::query_as::<_, Setting>("SELECT * FROM store_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("setting"))
    }

    pub async fn upsert_setting(&self, key: &str, value: &str) -> StorageResult<Setting> {
        let setting = sqlx::query_as::<_, Setting>(
            "INSERT INTO store_settings (key, value, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW() RETURNING *",
        )
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(setting)
    }

    /// Writes all pairs atomically.
    pub async fn upsert_settings(&self, values: &BTreeMap<String, String>) -> StorageResult<BTreeMap<String, String>> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                "INSERT INTO store_settings (key, value, updated_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::info!(count = values.len(), "settings updated");
        self.get_settings().await
    }

    pub async fn delete_setting(&self, key: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM store_settings WHERE key = $1").bind(key).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("setting"));
        }
        Ok(())
    }

    pub async fn shipping_policy(&self) -> StorageResult<ShippingPolicy> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM store_settings WHERE key = ANY($1)")
            .bind(keys::MONEY)
            .fetch_all(&self.pool)
            .await?;
        Ok(shipping_policy_from(&rows.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_setting() {
        assert!(validate_setting("store_name", "متجر الساعات").is_ok());
        assert!(validate_setting("Store Name", "x").is_err());
        assert!(validate_setting(keys::SHIPPING_COST, "25.50").is_ok());
        assert!(validate_setting(keys::SHIPPING_COST, "-1").is_err());
        assert!(validate_setting(keys::SHIPPING_COST, "free").is_err());
        assert!(validate_setting(keys::PRIMARY_COLOR, "#C9A227").is_ok());
        assert!(validate_setting(keys::PRIMARY_COLOR, "gold").is_err());
    }

    #[test]
    fn test_shipping_policy_from_settings() {
        let mut map = BTreeMap::new();
        assert_eq!(shipping_policy_from(&map), ShippingPolicy::default());
        map.insert(keys::SHIPPING_COST.to_string(), "30".to_string());
        map.insert(keys::FREE_SHIPPING_THRESHOLD.to_string(), "0".to_string());
        let policy = shipping_policy_from(&map);
        assert_eq!(policy.flat_rate, Decimal::new(30, 0));
        assert_eq!(policy.free_threshold, None);
        map.insert(keys::FREE_SHIPPING_THRESHOLD.to_string(), "500".to_string());
        assert_eq!(shipping_policy_from(&map).free_threshold, Some(Decimal::new(500, 0)));
    }
}
