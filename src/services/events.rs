//! Fire-and-forget delivery of domain events.
//!
//! Events go to NATS (when connected) on their subject as JSON. New orders are
//! additionally pushed to Telegram. Delivery runs on a spawned task; failures
//! are logged and never reach the request that raised the event.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::telegram::TelegramNotifier;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
    telegram: Option<TelegramNotifier>,
    currency: String,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>, telegram: Option<TelegramNotifier>, currency: impl Into<String>) -> Self {
        Self { nats, telegram, currency: currency.into() }
    }

    pub fn telegram(&self) -> Option<&TelegramNotifier> { self.telegram.as_ref() }

    pub fn currency(&self) -> &str { &self.currency }

    fn has_sinks(&self) -> bool { self.nats.is_some() || self.telegram.is_some() }

    /// Queues `event` for delivery. Returns `None` when nothing is configured.
    pub fn publish(&self, event: DomainEvent) -> Option<JoinHandle<()>> {
        if !self.has_sinks() {
            debug!(subject = event.subject(), "no event sinks configured, dropping event");
            return None;
        }
        let publisher = self.clone();
        Some(tokio::spawn(async move { publisher.deliver(event).await }))
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    async fn deliver(&self, event: DomainEvent) {
        let subject = event.subject();

        if let Some(nats) = &self.nats {
            match serde_json::to_vec(&event) {
                Ok(payload) => {
                    if let Err(e) = nats.publish(subject.to_string(), payload.into()).await {
                        warn!(subject, error = %e, "failed to publish event to NATS");
                    } else {
                        debug!(subject, "event published");
                    }
                }
                Err(e) => warn!(subject, error = %e, "failed to serialize event"),
            }
        }

        if let (Some(telegram), DomainEvent::Order(OrderEvent::Created { order })) = (&self.telegram, &event) {
            if let Err(e) = telegram.notify_new_order(order, &self.currency).await {
                warn!(order_number = %order.order.order_number, error = %e, "failed to send Telegram order notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ProductEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_without_sinks_is_noop() {
        let publisher = EventPublisher::new(None, None, "SAR");
        let event = DomainEvent::Product(ProductEvent::Created { product_id: Uuid::now_v7(), name: "Oud".into() });
        assert!(publisher.publish(event).is_none());
        assert_eq!(publisher.currency(), "SAR");
        assert!(publisher.telegram().is_none());
    }
}
