//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self { amount: amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), currency: currency.to_uppercase() }
    }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch { left: self.currency.clone(), right: other.currency.clone() }); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fixed = format!("{:.2}", self.amount.abs());
        let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 { grouped.push(','); }
            grouped.push(ch);
        }
        let sign = if self.amount.is_sign_negative() && !self.amount.is_zero() { "-" } else { "" };
        write!(f, "{sign}{grouped}.{frac} {}", self.currency)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

/// Quantity value object for a single cart or order line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        if value > MAX_LINE_QUANTITY { return Err(QuantityError::TooLarge(MAX_LINE_QUANTITY)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Result<Self, QuantityError> { Self::new(self.0.saturating_add(other.0)) }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    Zero,
    #[error("quantity may not exceed {0}")]
    TooLarge(u32),
}

/// Anonymous cart session identifier generated by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CartSessionId(String);

impl CartSessionId {
    pub fn parse(value: impl Into<String>) -> Result<Self, SessionIdError> {
        let value = value.into();
        let value = value.trim();
        if !(8..=128).contains(&value.len()) { return Err(SessionIdError::Length); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') { return Err(SessionIdError::Charset); }
        Ok(Self(value.to_string()))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl<'de> Deserialize<'de> for CartSessionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for CartSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session id must be 8 to 128 characters")]
    Length,
    #[error("session id may only contain letters, digits, '-' and '_'")]
    Charset,
}

/// URL slug value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    /// Builds a slug from a display name. Names without any ASCII letters or
    /// digits (Arabic-only names) get a short random slug instead.
    pub fn from_name(name: &str) -> Self {
        let mut slug = String::with_capacity(name.len());
        for ch in name.trim().chars().flat_map(char::to_lowercase) {
            if ch.is_ascii_alphanumeric() { slug.push(ch); }
            else if !slug.is_empty() && !slug.ends_with('-') { slug.push('-'); }
        }
        let slug = slug.trim_end_matches('-').to_string();
        if slug.is_empty() { return Self(format!("item-{:06x}", rand::random::<u32>() & 0x00ff_ffff)); }
        Self(slug)
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Customer phone number, normalized to ASCII digits with an optional leading `+`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Phone(String);

impl Phone {
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let raw = raw.trim();
        let plus = raw.starts_with('+');
        let mut digits = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                // Arabic-Indic and Eastern Arabic-Indic digits
                '\u{0660}'..='\u{0669}' => digits.push(char::from(b'0' + (ch as u32 - 0x0660) as u8)),
                '\u{06F0}'..='\u{06F9}' => digits.push(char::from(b'0' + (ch as u32 - 0x06F0) as u8)),
                ' ' | '-' | '(' | ')' | '.' | '+' => {}
                _ => return Err(PhoneError::InvalidCharacter(ch)),
            }
        }
        if !(7..=15).contains(&digits.len()) { return Err(PhoneError::Length); }
        Ok(Self(if plus { format!("+{digits}") } else { digits }))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number must have 7 to 15 digits")]
    Length,
    #[error("unexpected character {0:?} in phone number")]
    InvalidCharacter(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "sar");
        let b = Money::new(Decimal::new(5050, 2), "SAR");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(15050, 2));
        assert!(a.add(&Money::zero("USD")).is_err());
    }

    #[test]
    fn test_money_display_groups_thousands() {
        assert_eq!(Money::new(Decimal::new(125000, 2), "SAR").to_string(), "1,250.00 SAR");
        assert_eq!(Money::new(Decimal::new(1234567891, 2), "SAR").to_string(), "12,345,678.91 SAR");
        assert_eq!(Money::zero("SAR").to_string(), "0.00 SAR");
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
        assert_eq!(Quantity::new(100), Err(QuantityError::TooLarge(99)));
        let q = Quantity::new(98).unwrap();
        assert!(q.add(Quantity::new(2).unwrap()).is_err());
        assert_eq!(q.add(Quantity::new(1).unwrap()).unwrap().value(), 99);
    }

    #[test]
    fn test_session_id() {
        assert!(CartSessionId::parse("abc").is_err());
        assert!(CartSessionId::parse("abc def ghi").is_err());
        assert_eq!(CartSessionId::parse(" sess_12345-ab ").unwrap().as_str(), "sess_12345-ab");
    }

    #[test]
    fn test_slug_from_name() {
        assert_eq!(Slug::from_name("Rolex  Submariner (Steel)").as_str(), "rolex-submariner-steel");
        assert_eq!(Slug::from_name("عطر Oud 50ml").as_str(), "oud-50ml");
        assert!(Slug::from_name("عطر العود").as_str().starts_with("item-"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(Phone::parse("+966 50-123-4567").unwrap().as_str(), "+966501234567");
        assert_eq!(Phone::parse("٠٥٠١٢٣٤٥٦٧").unwrap().as_str(), "0501234567");
        assert_eq!(Phone::parse("123"), Err(PhoneError::Length));
        assert!(matches!(Phone::parse("050x1234567"), Err(PhoneError::InvalidCharacter('x'))));
    }
}
