use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::ChatId;

/// Job payload published to the prediction queue.
///
/// Field names on the wire are fixed by the detection worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub prediction_id: Uuid,
    /// Blob storage key of the uploaded image.
    #[serde(rename = "imgName")]
    pub image_name: String,
    pub chat_id: ChatId,
}

/// A submission tracked in the ledger until it produces a result or expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub prediction_id: Uuid,
    pub chat_id: ChatId,
    pub image_name: String,
    pub submitted_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}
