//! Product and Category Aggregates

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::value_objects::Slug;

/// Gender targets accepted for a product (mostly relevant for perfumes and watches).
pub const GENDERS: &[&str] = &["men", "women", "unisex"];

/// Stock level at or below which a product counts as low on stock.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub name_ar: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 120))]
    pub name_ar: String,
    #[validate(length(min = 1, max = 140))]
    pub slug: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl CategoryInput {
    pub fn slug(&self) -> Slug {
        Slug::from_name(self.slug.as_deref().unwrap_or(&self.name))
    }

    /// Slug given by the caller, if any. Replacing a record without one keeps the stored slug.
    pub fn requested_slug(&self) -> Option<Slug> {
        self.slug.as_deref().filter(|s| !s.trim().is_empty()).map(Slug::from_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub name_ar: String,
    pub slug: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub gender: Option<String>,
    pub images: Vec<String>,
    pub stock: i32,
    pub is_featured: bool,
    pub is_new: bool,
    pub is_active: bool,
    pub specifications: serde_json::Value,
    pub rating: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_purchasable(&self, quantity: u32) -> bool {
        self.is_active && i64::from(self.stock) >= i64::from(quantity)
    }

    pub fn is_low_stock(&self) -> bool { self.stock <= LOW_STOCK_THRESHOLD }

    /// Whole-number discount relative to `compare_at_price`, if the product is on sale.
    pub fn discount_percent(&self) -> Option<u32> {
        let was = self.compare_at_price.filter(|was| *was > self.price && !self.price.is_zero())?;
        ((was - self.price) / was * Decimal::ONE_HUNDRED).round().to_u32()
    }

    /// Merges a partial update into the current values, producing a full input to validate.
    pub fn apply_patch(&self, patch: ProductPatch) -> ProductInput {
        ProductInput {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            name_ar: patch.name_ar.unwrap_or_else(|| self.name_ar.clone()),
            slug: Some(patch.slug.unwrap_or_else(|| self.slug.clone())),
            description: patch.description.or_else(|| self.description.clone()),
            description_ar: patch.description_ar.or_else(|| self.description_ar.clone()),
            price: patch.price.unwrap_or(self.price),
            compare_at_price: match patch.compare_at_price { Some(v) => v, None => self.compare_at_price },
            category_id: match patch.category_id { Some(v) => v, None => self.category_id },
            brand: patch.brand.or_else(|| self.brand.clone()),
            gender: patch.gender.or_else(|| self.gender.clone()),
            images: patch.images.unwrap_or_else(|| self.images.clone()),
            stock: patch.stock.unwrap_or(self.stock),
            is_featured: patch.is_featured.unwrap_or(self.is_featured),
            is_new: patch.is_new.unwrap_or(self.is_new),
            is_active: patch.is_active.unwrap_or(self.is_active),
            specifications: patch.specifications.or_else(|| Some(self.specifications.clone())),
            rating: patch.rating.or(Some(self.rating)),
        }
    }
}

fn default_true() -> bool { true }

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    if GENDERS.contains(&gender) { Ok(()) } else { Err(ValidationError::new("gender")) }
}

/// Full product payload used for create and replace.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub name_ar: String,
    #[validate(length(min = 1, max = 220))]
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub description_ar: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 120))]
    pub brand: Option<String>,
    #[validate(custom = "validate_gender")]
    pub gender: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub images: Vec<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000000))]
    pub stock: i32,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub specifications: Option<serde_json::Value>,
    pub rating: Option<Decimal>,
}

impl ProductInput {
    /// Business rules that span several fields.
    pub fn check(&self) -> Result<(), ProductError> {
        if self.price <= Decimal::ZERO { return Err(ProductError::InvalidPrice); }
        if let Some(was) = self.compare_at_price {
            if was <= self.price { return Err(ProductError::CompareAtNotHigher); }
        }
        if let Some(rating) = self.rating {
            if rating < Decimal::ZERO || rating > Decimal::from(5) { return Err(ProductError::InvalidRating); }
        }
        if let Some(spec) = &self.specifications {
            if !spec.is_object() { return Err(ProductError::InvalidSpecifications); }
        }
        Ok(())
    }

    pub fn slug(&self) -> Slug {
        Slug::from_name(self.slug.as_deref().unwrap_or(&self.name))
    }

    /// Slug given by the caller, if any. Replacing a record without one keeps the stored slug.
    pub fn requested_slug(&self) -> Option<Slug> {
        self.slug.as_deref().filter(|s| !s.trim().is_empty()).map(Slug::from_name)
    }
}

/// Partial product update. For nullable columns, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name_ar: Option<String>,
    #[validate(length(min = 1, max = 220))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    pub brand: Option<String>,
    #[validate(custom = "validate_gender")]
    pub gender: Option<String>,
    pub images: Option<Vec<String>>,
    #[validate(range(min = 0, max = 1000000))]
    pub stock: Option<i32>,
    pub is_featured: Option<bool>,
    pub is_new: Option<bool>,
    pub is_active: Option<bool>,
    pub specifications: Option<serde_json::Value>,
    pub rating: Option<Decimal>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("price must be greater than zero")]
    InvalidPrice,
    #[error("compare-at price must be higher than the price")]
    CompareAtNotHigher,
    #[error("rating must be between 0 and 5")]
    InvalidRating,
    #[error("specifications must be a JSON object")]
    InvalidSpecifications,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(price: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::now_v7(), name: "Oud Royal".into(), name_ar: "عود ملكي".into(), slug: "oud-royal".into(),
            description: None, description_ar: None, price: Decimal::new(price, 2), compare_at_price: None,
            category_id: None, brand: Some("Arabian Oud".into()), gender: Some("unisex".into()), images: vec![],
            stock, is_featured: false, is_new: true, is_active: true, specifications: serde_json::json!({}),
            rating: Decimal::ZERO, created_at: now, updated_at: now,
        }
    }

    fn input() -> ProductInput {
        serde_json::from_value(serde_json::json!({
            "name": "Seiko 5", "name_ar": "سيكو ٥", "price": "450.00", "stock": 3
        })).unwrap()
    }

    #[test]
    fn test_input_defaults() {
        let i = input();
        assert!(i.is_active);
        assert!(!i.is_featured);
        assert!(i.images.is_empty());
        assert_eq!(i.slug().as_str(), "seiko-5");
        assert!(i.requested_slug().is_none());
        assert!(i.validate().is_ok());
        assert!(i.check().is_ok());
    }

    #[test]
    fn test_input_price_rules() {
        let mut i = input();
        i.compare_at_price = Some(Decimal::new(400, 0));
        assert_eq!(i.check(), Err(ProductError::CompareAtNotHigher));
        i.compare_at_price = None;
        i.price = Decimal::ZERO;
        assert_eq!(i.check(), Err(ProductError::InvalidPrice));
    }

    #[test]
    fn test_gender_validation() {
        let mut i = input();
        i.gender = Some("kids".into());
        assert!(i.validate().is_err());
        i.gender = Some("women".into());
        assert!(i.validate().is_ok());
    }

    #[test]
    fn test_purchasable() {
        let mut p = product(10000, 2);
        assert!(p.is_purchasable(2));
        assert!(!p.is_purchasable(3));
        p.is_active = false;
        assert!(!p.is_purchasable(1));
    }

    #[test]
    fn test_discount_percent() {
        let mut p = product(7500, 1);
        assert_eq!(p.discount_percent(), None);
        p.compare_at_price = Some(Decimal::new(10000, 2));
        assert_eq!(p.discount_percent(), Some(25));
    }

    #[test]
    fn test_patch_clears_nullable_fields() {
        let mut p = product(7500, 1);
        p.compare_at_price = Some(Decimal::new(9000, 2));
        let patch: ProductPatch = serde_json::from_value(serde_json::json!({ "compare_at_price": null, "stock": 9 })).unwrap();
        let merged = p.apply_patch(patch);
        assert_eq!(merged.compare_at_price, None);
        assert_eq!(merged.stock, 9);
        assert_eq!(merged.name, "Oud Royal");

        let untouched = p.apply_patch(ProductPatch::default());
        assert_eq!(untouched.compare_at_price, Some(Decimal::new(9000, 2)));
    }
}
