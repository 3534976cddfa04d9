//! Outbound integrations.

pub mod events;
pub mod telegram;

pub use events::EventPublisher;
pub use telegram::{format_order_message, TelegramError, TelegramNotifier};
