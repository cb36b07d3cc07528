use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::prediction::{DeliveryOutcome, Label, PredictionResult};
use crate::services::store::{Claim, ResultStore, StoreError};
use crate::services::telegram::{ChatError, ChatTransport};

pub const NO_OBJECTS_TEXT: &str = "No objects were detected in your image.";

/// Count labels per class, keeping classes in the order they first appear.
pub fn aggregate_labels(labels: &[Label]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for label in labels {
        match index.get(label.class.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(label.class.as_str(), counts.len());
                counts.push((label.class.clone(), 1));
            }
        }
    }

    counts
}

/// Render one `"<class>: <count>"` line per distinct class.
pub fn render_result(result: &PredictionResult) -> String {
    let counts = aggregate_labels(&result.labels);
    if counts.is_empty() {
        return NO_OBJECTS_TEXT.to_string();
    }

    counts
        .iter()
        .map(|(class, count)| format!("{class}: {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Routes completed predictions back to the chat that submitted them.
pub struct ResultHandler {
    store: Arc<dyn ResultStore>,
    chat: Arc<dyn ChatTransport>,
}

impl ResultHandler {
    pub fn new(store: Arc<dyn ResultStore>, chat: Arc<dyn ChatTransport>) -> Self {
        Self { store, chat }
    }

    /// Deliver the stored result for `prediction_id`.
    ///
    /// The destination chat is always read from the stored record. A result is
    /// sent at most once; later calls report `AlreadyDelivered`.
    pub async fn deliver(&self, prediction_id: Option<&str>) -> Result<DeliveryOutcome, DeliveryError> {
        let Some(raw_id) = prediction_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok(DeliveryOutcome::MalformedInput);
        };
        let Ok(prediction_id) = Uuid::parse_str(raw_id) else {
            tracing::warn!(prediction_id = %raw_id, "Rejected malformed prediction id");
            return Ok(DeliveryOutcome::MalformedInput);
        };

        let store = self.store.clone();
        let chat = self.chat.clone();
        // Runs detached so a dropped request cannot leave a claim without a send.
        tokio::spawn(async move { claim_and_send(&*store, &*chat, prediction_id).await }).await?
    }
}

async fn claim_and_send(
    store: &dyn ResultStore,
    chat: &dyn ChatTransport,
    prediction_id: Uuid,
) -> Result<DeliveryOutcome, DeliveryError> {
    let result = match store.claim(prediction_id).await? {
        Claim::Claimed(result) => result,
        Claim::AlreadyDelivered => {
            tracing::info!(%prediction_id, "Prediction result already delivered");
            return Ok(DeliveryOutcome::AlreadyDelivered);
        }
        Claim::Missing => {
            metrics::counter!("predictions_not_found_total").increment(1);
            tracing::info!(%prediction_id, "No prediction result yet");
            return Ok(DeliveryOutcome::NotFound);
        }
    };

    let text = render_result(&result);
    if let Err(e) = chat.send_text(result.chat_id, &text).await {
        tracing::error!(%prediction_id, chat_id = %result.chat_id, error = %e, "Failed to send prediction result");
        if let Err(release_err) = store.release(prediction_id).await {
            tracing::error!(%prediction_id, error = %release_err, "Failed to release delivery claim");
        }
        return Err(DeliveryError::ChatUnavailable(e));
    }

    metrics::counter!("predictions_delivered_total").increment(1);
    tracing::info!(
        %prediction_id,
        chat_id = %result.chat_id,
        labels = result.labels.len(),
        "Prediction result delivered"
    );
    Ok(DeliveryOutcome::Delivered)
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Result store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Chat transport unavailable: {0}")]
    ChatUnavailable(#[source] ChatError),

    #[error("Delivery task failed: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}
