//! Domain events

use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, OrderWithItems};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, name: String },
    LowStock { product_id: Uuid, name: String, stock: i32 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order: OrderWithItems },
    StatusChanged { order_id: Uuid, order_number: String, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: Uuid, order_number: String },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Created { .. }) => "souq.products.created",
            Self::Product(ProductEvent::LowStock { .. }) => "souq.products.low_stock",
            Self::Order(OrderEvent::Created { .. }) => "souq.orders.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "souq.orders.status_changed",
            Self::Order(OrderEvent::Cancelled { .. }) => "souq.orders.cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_shape() {
        let id = Uuid::now_v7();
        let event = DomainEvent::Product(ProductEvent::LowStock { product_id: id, name: "Oud".into(), stock: 2 });
        assert_eq!(event.subject(), "souq.products.low_stock");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["aggregate"], "product");
        assert_eq!(json["event"]["type"], "low_stock");
        assert_eq!(json["event"]["stock"], 2);
    }
}
