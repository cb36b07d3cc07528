use axum::body::Bytes;
use axum::extract::State;
use teloxide::types::Update;

use crate::app_state::AppState;
use crate::models::chat::ChatMessage;

/// POST /{token}/: Telegram update delivery.
///
/// Always answers `Ok`: any other response makes Telegram redeliver the same
/// update indefinitely.
pub async fn telegram_webhook(State(state): State<AppState>, body: Bytes) -> &'static str {
    let update = match serde_json::from_slice::<Update>(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparsable webhook update");
            return "Ok";
        }
    };

    match ChatMessage::from_update(&update) {
        Some(msg) => {
            tracing::info!(
                update_id = ?update.id,
                chat_id = %msg.chat_id,
                has_text = msg.text.is_some(),
                has_photo = msg.photo_ref.is_some(),
                "Incoming message"
            );
            state.dispatcher.handle(&msg).await;
        }
        None => tracing::debug!(update_id = ?update.id, "Ignoring update without a message"),
    }

    "Ok"
}

/// GET /{token}/: Reachability probe used during webhook registration.
pub async fn webhook_probe() -> &'static str {
    "Ok"
}
