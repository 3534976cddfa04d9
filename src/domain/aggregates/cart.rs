//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Quantity, QuantityError};

/// One product row in a session's cart, joined with the live product.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub item_id: Uuid,
    pub quantity: i32,
    #[sqlx(flatten)]
    pub product: Product,
}

impl CartLine {
    pub fn unit_price(&self) -> Decimal { self.product.price }
    pub fn line_total(&self) -> Decimal { self.product.price * Decimal::from(self.quantity) }
}

/// Flat-rate shipping with an optional free-shipping threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub flat_rate: Decimal,
    pub free_threshold: Option<Decimal>,
}

impl Default for ShippingPolicy {
    fn default() -> Self { Self { flat_rate: Decimal::ZERO, free_threshold: None } }
}

impl ShippingPolicy {
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal.is_zero() { return Decimal::ZERO; }
        match self.free_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_rate,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub free_shipping_remaining: Option<Decimal>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    pub session_id: String,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(session_id: impl Into<String>, lines: Vec<CartLine>) -> Self {
        Self { session_id: session_id.into(), lines }
    }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| u32::try_from(l.quantity).unwrap_or(0)).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn summary(&self, policy: &ShippingPolicy) -> CartSummary {
        let subtotal = self.subtotal();
        let shipping = policy.shipping_for(subtotal);
        let free_shipping_remaining = policy
            .free_threshold
            .filter(|t| !subtotal.is_zero() && subtotal < *t)
            .map(|t| t - subtotal);
        CartSummary { item_count: self.item_count(), subtotal, shipping, total: subtotal + shipping, free_shipping_remaining }
    }

    /// Every line must reference an active product with enough stock.
    pub fn validate_stock(&self) -> Result<(), CartError> {
        if self.is_empty() { return Err(CartError::Empty); }
        for line in &self.lines {
            let qty = u32::try_from(line.quantity).unwrap_or(0);
            if !line.product.is_active {
                return Err(CartError::ProductUnavailable { product: line.product.name_ar.clone() });
            }
            if !line.product.is_purchasable(qty) {
                return Err(CartError::InsufficientStock { product: line.product.name_ar.clone(), available: line.product.stock.max(0) });
            }
        }
        Ok(())
    }
}

/// Resolves the quantity a cart line should hold after adding `requested` more units.
pub fn merged_quantity(existing: Option<i32>, requested: Quantity, product: &Product) -> Result<Quantity, CartError> {
    if !product.is_active { return Err(CartError::ProductUnavailable { product: product.name_ar.clone() }); }
    let total = match existing.and_then(|q| u32::try_from(q).ok()).filter(|q| *q > 0) {
        Some(current) => Quantity::new(current)?.add(requested)?,
        None => requested,
    };
    if !product.is_purchasable(total.value()) {
        return Err(CartError::InsufficientStock { product: product.name_ar.clone(), available: product.stock.max(0) });
    }
    Ok(total)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("cart item not found")]
    ItemNotFound,
    #[error("{product} is no longer available")]
    ProductUnavailable { product: String },
    #[error("only {available} left in stock for {product}")]
    InsufficientStock { product: String, available: i32 },
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product;

    fn line(price: i64, stock: i32, quantity: i32) -> CartLine {
        CartLine { item_id: Uuid::now_v7(), quantity, product: product(price, stock) }
    }

    fn policy() -> ShippingPolicy {
        ShippingPolicy { flat_rate: Decimal::new(25, 0), free_threshold: Some(Decimal::new(500, 0)) }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::new("session-abc", vec![line(10000, 5, 2), line(5050, 5, 1)]);
        let summary = cart.summary(&policy());
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal, Decimal::new(25050, 2));
        assert_eq!(summary.shipping, Decimal::new(25, 0));
        assert_eq!(summary.total, Decimal::new(27550, 2));
        assert_eq!(summary.free_shipping_remaining, Some(Decimal::new(24950, 2)));
    }

    #[test]
    fn test_free_shipping_threshold() {
        let cart = Cart::new("session-abc", vec![line(50000, 5, 1)]);
        let summary = cart.summary(&policy());
        assert_eq!(summary.shipping, Decimal::ZERO);
        assert_eq!(summary.free_shipping_remaining, None);
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let cart = Cart::new("session-abc", vec![]);
        assert_eq!(cart.summary(&policy()).total, Decimal::ZERO);
        assert_eq!(cart.validate_stock(), Err(CartError::Empty));
    }

    #[test]
    fn test_validate_stock() {
        let cart = Cart::new("session-abc", vec![line(10000, 1, 2)]);
        assert!(matches!(cart.validate_stock(), Err(CartError::InsufficientStock { available: 1, .. })));

        let mut inactive = line(10000, 10, 1);
        inactive.product.is_active = false;
        let cart = Cart::new("session-abc", vec![inactive]);
        assert!(matches!(cart.validate_stock(), Err(CartError::ProductUnavailable { .. })));
    }

    #[test]
    fn test_merged_quantity() {
        let p = product(10000, 4);
        let two = Quantity::new(2).unwrap();
        assert_eq!(merged_quantity(None, two, &p).unwrap().value(), 2);
        assert_eq!(merged_quantity(Some(2), two, &p).unwrap().value(), 4);
        assert!(matches!(merged_quantity(Some(3), two, &p), Err(CartError::InsufficientStock { available: 4, .. })));

        let plenty = product(10000, 1000);
        assert!(matches!(merged_quantity(Some(98), two, &plenty), Err(CartError::Quantity(QuantityError::TooLarge(99)))));
    }
}
