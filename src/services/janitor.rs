use std::time::Duration;

use crate::services::store::{StoreError, SubmissionLedger};
use crate::services::telegram::ChatTransport;

pub const EXPIRED_TEXT: &str =
    "Sorry, we could not finish analysing your image in time. Please send it again.";

/// Expire stale submissions and tell each chat its prediction failed.
///
/// Returns how many submissions this sweep expired. A row is expired before
/// its chat is notified, so a failed notice is logged and never repeated.
pub async fn sweep_expired(
    ledger: &dyn SubmissionLedger,
    chat: &dyn ChatTransport,
    ttl: Duration,
) -> Result<usize, StoreError> {
    let expired = ledger.expire_stale(ttl).await?;

    for record in &expired {
        tracing::warn!(
            prediction_id = %record.prediction_id,
            chat_id = %record.chat_id,
            submitted_at = %record.submitted_at,
            "Prediction expired without a result"
        );

        if let Err(e) = chat.send_text(record.chat_id, EXPIRED_TEXT).await {
            tracing::error!(prediction_id = %record.prediction_id, error = %e, "Failed to notify chat of expiry");
        }
    }

    Ok(expired.len())
}
