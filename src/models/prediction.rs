use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::ChatId;

/// One detected object as written by the detection worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Geometry as written by the worker; passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<serde_json::Value>,
}

impl Label {
    pub fn of_class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            confidence: None,
            bbox: None,
        }
    }
}

/// Completed prediction stored by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction_id: Uuid,
    pub chat_id: ChatId,
    pub original_img_path: String,
    pub labels: Vec<Label>,
}

/// Result of a delivery attempt for one prediction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The result was delivered by an earlier call; nothing was sent.
    AlreadyDelivered,
    NotFound,
    MalformedInput,
}
