use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use teloxide::types::{Message, Update, UpdateKind};

/// Telegram chat identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One inbound chat message, reduced to the fields the bot acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub chat_id: ChatId,
    pub text: Option<String>,
    /// `file_id` of the largest photo size attached to the message.
    pub photo_ref: Option<String>,
    pub caption: Option<String>,
}

impl ChatMessage {
    /// Reduce a webhook update. Only new messages are acted on; edits, channel
    /// posts and callbacks yield `None`.
    pub fn from_update(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(msg) => Some(Self::from(msg)),
            _ => None,
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        // Telegram lists photo sizes smallest first.
        let photo_ref = msg
            .photo()
            .and_then(|sizes| sizes.last())
            .map(|size| size.file.id.to_string());

        Self {
            chat_id: ChatId(msg.chat.id.0),
            text: msg.text().map(str::to_string),
            photo_ref,
            caption: msg.caption().map(str::to_string),
        }
    }
}

/// Photo captions the bot understands. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum Caption {
    Blur,
    Contour,
    #[strum(serialize = "Salt and pepper")]
    SaltAndPepper,
    Mix,
    Predict,
}
