//! Order Aggregate

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::aggregates::cart::{Cart, CartError, ShippingPolicy};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CartSessionId, Phone, PhoneError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label_ar(self) -> &'static str {
        match self {
            Self::Pending => "قيد الانتظار",
            Self::Confirmed => "مؤكد",
            Self::Shipped => "تم الشحن",
            Self::Delivered => "تم التوصيل",
            Self::Cancelled => "ملغي",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    BankTransfer,
}

impl PaymentMethod {
    pub fn label_ar(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "الدفع عند الاستلام",
            Self::BankTransfer => "تحويل بنكي",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub session_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub city: String,
    pub address: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_name_ar: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    pub fn created_event(&self) -> DomainEvent {
        DomainEvent::Order(OrderEvent::Created { order: self.clone() })
    }

    pub fn status_event(&self, from: OrderStatus) -> DomainEvent {
        let order = &self.order;
        if order.status == OrderStatus::Cancelled {
            DomainEvent::Order(OrderEvent::Cancelled { order_id: order.id, order_number: order.order_number.clone() })
        } else {
            DomainEvent::Order(OrderEvent::StatusChanged { order_id: order.id, order_number: order.order_number.clone(), from, to: order.status })
        }
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    Phone::parse(phone).map(|_| ()).map_err(|_| ValidationError::new("phone"))
}

fn validate_session(session: &str) -> Result<(), ValidationError> {
    CartSessionId::parse(session).map(|_| ()).map_err(|_| ValidationError::new("session_id"))
}

/// Optional form fields arrive as `""` when left empty.
fn blank_as_none<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(custom = "validate_session")]
    pub session_id: String,
    #[validate(length(min = 2, max = 120))]
    pub customer_name: String,
    #[validate(custom = "validate_phone")]
    pub customer_phone: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(min = 2, max = 80))]
    pub city: String,
    #[validate(length(min = 5, max = 500))]
    pub address: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_name_ar: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

/// Everything needed to persist an order, computed from a validated cart.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_number: String,
    pub session_id: String,
    pub customer_name: String,
    pub customer_phone: Phone,
    pub customer_email: Option<String>,
    pub city: String,
    pub address: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<DraftItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

impl OrderDraft {
    pub fn from_cart(cart: &Cart, request: &CheckoutRequest, policy: &ShippingPolicy) -> Result<Self, OrderError> {
        if cart.session_id != request.session_id { return Err(OrderError::SessionMismatch); }
        cart.validate_stock()?;
        let phone = Phone::parse(&request.customer_phone)?;
        let items = cart
            .lines
            .iter()
            .map(|line| DraftItem {
                product_id: line.product.id,
                product_name: line.product.name.clone(),
                product_name_ar: line.product.name_ar.clone(),
                unit_price: line.unit_price(),
                quantity: line.quantity,
                total: line.line_total(),
            })
            .collect();
        let summary = cart.summary(policy);
        Ok(Self {
            order_number: generate_order_number(),
            session_id: request.session_id.clone(),
            customer_name: request.customer_name.trim().to_string(),
            customer_phone: phone,
            customer_email: request.customer_email.clone().filter(|e| !e.trim().is_empty()),
            city: request.city.trim().to_string(),
            address: request.address.trim().to_string(),
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            payment_method: request.payment_method.unwrap_or_default(),
            items,
            subtotal: summary.subtotal,
            shipping_cost: summary.shipping,
            total: summary.total,
        })
    }
}

pub fn generate_order_number() -> String {
    format!("ORD-{:08}", rand::thread_rng().gen_range(0..100_000_000u32))
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),
    #[error("checkout session does not match cart")]
    SessionMismatch,
    #[error("cannot change order status from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::CartLine;
    use crate::domain::aggregates::product::tests::product;

    fn request() -> CheckoutRequest {
        serde_json::from_value(serde_json::json!({
            "session_id": "sess-0001-abcd",
            "customer_name": "محمد علي",
            "customer_phone": "+966 55 000 1111",
            "city": "الرياض",
            "address": "حي النخيل، شارع ١٢",
        }))
        .unwrap()
    }

    #[test]
    fn test_blank_optional_fields_accepted() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "session_id": "sess-0001-abcd",
            "customer_name": "محمد علي",
            "customer_phone": "0550001111",
            "customer_email": "",
            "city": "جدة",
            "address": "حي الروضة، شارع ٤",
            "notes": "  ",
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.customer_email, None);
        assert_eq!(request.notes, None);

        let mut bad = request;
        bad.customer_email = Some("not-an-email".into());
        assert!(bad.validate().is_err());
    }

    fn cart() -> Cart {
        Cart::new(
            "sess-0001-abcd",
            vec![CartLine { item_id: Uuid::now_v7(), quantity: 2, product: product(15000, 10) }],
        )
    }

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_checkout_request_validation() {
        let req = request();
        assert!(req.validate().is_ok());
        let mut bad = request();
        bad.customer_phone = "12".into();
        bad.customer_email = Some("not-an-email".into());
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("customer_phone"));
        assert!(fields.contains_key("customer_email"));
    }

    #[test]
    fn test_draft_from_cart() {
        let policy = ShippingPolicy { flat_rate: Decimal::new(30, 0), free_threshold: Some(Decimal::new(1000, 0)) };
        let draft = OrderDraft::from_cart(&cart(), &request(), &policy).unwrap();
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].total, Decimal::new(300, 0));
        assert_eq!(draft.subtotal, Decimal::new(300, 0));
        assert_eq!(draft.shipping_cost, Decimal::new(30, 0));
        assert_eq!(draft.total, Decimal::new(330, 0));
        assert_eq!(draft.customer_phone.as_str(), "+966550001111");
        assert_eq!(draft.payment_method, PaymentMethod::CashOnDelivery);
        assert!(draft.order_number.starts_with("ORD-"));
        assert_eq!(draft.order_number.len(), 12);
    }

    #[test]
    fn test_draft_rejects_empty_or_foreign_cart() {
        let policy = ShippingPolicy::default();
        let empty = Cart::new("sess-0001-abcd", vec![]);
        assert_eq!(OrderDraft::from_cart(&empty, &request(), &policy).unwrap_err(), OrderError::Cart(CartError::Empty));
        let other = Cart::new("sess-9999-zzzz", cart().lines);
        assert_eq!(OrderDraft::from_cart(&other, &request(), &policy).unwrap_err(), OrderError::SessionMismatch);
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(serde_json::to_value(OrderStatus::Cancelled).unwrap(), "cancelled");
        let m: PaymentMethod = serde_json::from_value(serde_json::json!("bank_transfer")).unwrap();
        assert_eq!(m, PaymentMethod::BankTransfer);
    }
}
