use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::auth::AdminClaims;
use crate::error::Result;
use crate::services::TelegramError;
use crate::state::AppState;

const TEST_MESSAGE: &str = "✅ <b>رسالة تجريبية</b>\nإشعارات الطلبات الجديدة تعمل بنجاح.";

/// Sends a test message so admins can confirm the bot token and chat id.
pub async fn send_test(AdminClaims(admin): AdminClaims, State(state): State<AppState>) -> Result<Json<Value>> {
    let telegram = state.events().telegram().ok_or(TelegramError::Disabled)?;
    telegram.send_message(TEST_MESSAGE).await?;
    tracing::info!(admin = %admin.username, chat_id = %telegram.chat_id(), "Telegram test message sent");
    Ok(Json(json!({ "sent": true })))
}
