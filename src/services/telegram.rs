//! Telegram Bot API client for back-office notifications.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::TelegramConfig;
use crate::domain::aggregates::OrderWithItems;
use crate::domain::value_objects::Money;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token or chat id not configured.
    #[error("Telegram notifications are disabled")]
    Disabled,

    #[error("Telegram request failed: {0}")]
    Request(String),

    #[error("Telegram response error: {0}")]
    Response(String),

    #[error("Telegram API error ({status}): {description}")]
    Api { status: u16, description: String },
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: SecretString,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelegramError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    pub fn chat_id(&self) -> &str { &self.chat_id }

    /// Sends an HTML-formatted message to the configured chat.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the API answers with a non-2xx
    /// status, or the body reports `ok: false`.
    #[instrument(skip(self, text), fields(chat_id = %self.chat_id, len = text.len()))]
    pub async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token.expose_secret());
        let body = SendMessage { chat_id: &self.chat_id, text, parse_mode: "HTML", disable_web_page_preview: true };

        // reqwest errors can embed the URL, which contains the token
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TelegramError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let raw = response.text().await.map_err(|e| TelegramError::Response(e.without_url().to_string()))?;
        let parsed = serde_json::from_str::<ApiResponse>(&raw);

        match parsed {
            Ok(api) if status.is_success() && api.ok => {
                debug!("Telegram message sent");
                Ok(())
            }
            Ok(api) => {
                let description = api.description.unwrap_or_else(|| "unknown error".to_string());
                warn!(status = status.as_u16(), %description, "Telegram API rejected message");
                Err(TelegramError::Api { status: status.as_u16(), description })
            }
            Err(_) if !status.is_success() => {
                Err(TelegramError::Api { status: status.as_u16(), description: status.canonical_reason().unwrap_or("error").to_string() })
            }
            Err(e) => Err(TelegramError::Response(e.to_string())),
        }
    }

    #[instrument(skip(self, order), fields(order_number = %order.order.order_number))]
    pub async fn notify_new_order(&self, order: &OrderWithItems, currency: &str) -> Result<(), TelegramError> {
        self.send_message(&format_order_message(order, currency)).await
    }
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Arabic new-order notification.
pub fn format_order_message(order: &OrderWithItems, currency: &str) -> String {
    let o = &order.order;
    let mut lines = vec![
        format!("🛒 <b>طلب جديد</b> <code>{}</code>", escape_html(&o.order_number)),
        String::new(),
        format!("👤 العميل: {}", escape_html(&o.customer_name)),
        format!("📞 الهاتف: {}", escape_html(&o.customer_phone)),
        format!("🏙 المدينة: {}", escape_html(&o.city)),
        format!("📍 العنوان: {}", escape_html(&o.address)),
        format!("💳 الدفع: {}", o.payment_method.label_ar()),
    ];
    if let Some(notes) = o.notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("📝 ملاحظات: {}", escape_html(notes)));
    }
    lines.push(String::new());
    lines.push("<b>المنتجات:</b>".to_string());
    for item in &order.items {
        lines.push(format!(
            "• {} × {} = {}",
            escape_html(&item.product_name_ar),
            item.quantity,
            Money::new(item.total, currency)
        ));
    }
    lines.push(String::new());
    lines.push(format!("المجموع الفرعي: {}", Money::new(o.subtotal, currency)));
    lines.push(format!("الشحن: {}", Money::new(o.shipping_cost, currency)));
    lines.push(format!("<b>الإجمالي: {}</b>", Money::new(o.total, currency)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Order, OrderItem, OrderStatus, PaymentMethod};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order() -> OrderWithItems {
        let now = Utc::now();
        let id = Uuid::now_v7();
        OrderWithItems {
            order: Order {
                id,
                order_number: "ORD-00001234".into(),
                session_id: Some("sess-0001-abcd".into()),
                customer_name: "سارة <script>".into(),
                customer_phone: "+966550001111".into(),
                customer_email: None,
                city: "جدة".into(),
                address: "حي الروضة & شارع الأمير".into(),
                notes: None,
                payment_method: PaymentMethod::CashOnDelivery,
                status: OrderStatus::Pending,
                subtotal: Decimal::new(125000, 2),
                shipping_cost: Decimal::ZERO,
                total: Decimal::new(125000, 2),
                created_at: now,
                updated_at: now,
            },
            items: vec![OrderItem {
                id: Uuid::now_v7(),
                order_id: id,
                product_id: None,
                product_name: "Royal Oud".into(),
                product_name_ar: "عود ملكي".into(),
                unit_price: Decimal::new(62500, 2),
                quantity: 2,
                total: Decimal::new(125000, 2),
            }],
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>a & \"b\"</b>"), "&lt;b&gt;a &amp; &quot;b&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_format_order_message() {
        let text = format_order_message(&order(), "SAR");
        assert!(text.contains("ORD-00001234"));
        assert!(text.contains("سارة &lt;script&gt;"));
        assert!(text.contains("حي الروضة &amp; شارع الأمير"));
        assert!(text.contains("• عود ملكي × 2 = 1,250.00 SAR"));
        assert!(text.contains("<b>الإجمالي: 1,250.00 SAR</b>"));
        assert!(text.contains("الدفع عند الاستلام"));
        assert!(!text.contains("ملاحظات"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = TelegramConfig {
            api_base: "https://api.telegram.org/".into(),
            bot_token: SecretString::from("123456:SECRET".to_string()),
            chat_id: "-100".into(),
        };
        let notifier = TelegramNotifier::new(&config).unwrap();
        assert_eq!(notifier.api_base, "https://api.telegram.org");
        assert!(!format!("{notifier:?}").contains("SECRET"));
    }
}
