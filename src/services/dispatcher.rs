use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::chat::{Caption, ChatId, ChatMessage};
use crate::services::filters::{Filter, FilterError, ImageFilters};
use crate::services::submitter::JobSubmitter;
use crate::services::telegram::{ChatError, ChatTransport};
use crate::services::trivia::TriviaSource;

pub const HELP_TEXT: &str = "Welcome! Here are the available commands and captions:\n\
Commands:\n  \
  - /help: Show available features\n  \
  - joke: Receive a random joke\n  \
  - fact: Get an interesting fact\n\n\
Available captions for photos:\n  \
  - Blur\n  - Contour\n  - Salt and pepper\n  - Mix\n  - Predict\n\
Try sending a photo with one of these captions!";

pub const USAGE_TEXT: &str = "Error: Invalid caption\nAvailable captions:\n\
1) Blur\n2) Mix\n3) Salt and pepper\n4) Contour\n5) Predict";

pub const PROMPT_TEXT: &str = "Please provide a valid caption or text.";
pub const FAILURE_TEXT: &str = "failed - try again later";
pub const PREDICT_ACK_TEXT: &str = "Your image is being processed. Please wait...";
pub const SUBMIT_FAILED_TEXT: &str = "Failed to process the image. Please try again later.";
pub const ECHO_PREFIX: &str = "Your original message: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextCommand {
    Joke,
    Fact,
    Help,
    Echo,
}

fn classify_text(text: &str) -> TextCommand {
    let lowered = text.to_lowercase();
    if lowered.contains("joke") {
        TextCommand::Joke
    } else if lowered.contains("fact") {
        TextCommand::Fact
    } else if lowered == "/start" || lowered == "/help" {
        TextCommand::Help
    } else {
        TextCommand::Echo
    }
}

/// Filters applied in order, each to the previous one's output.
#[derive(Debug, Clone, Copy)]
struct FilterPlan {
    chain: &'static [Filter],
    started: &'static str,
    done: &'static str,
}

#[derive(Debug, Clone, Copy)]
enum PhotoAction {
    Filter(FilterPlan),
    Predict,
}

fn action_for(caption: Caption) -> PhotoAction {
    match caption {
        Caption::Blur => PhotoAction::Filter(FilterPlan {
            chain: &[Filter::Blur],
            started: "Blur filter in progress",
            done: "Blur filter applied",
        }),
        Caption::Contour => PhotoAction::Filter(FilterPlan {
            chain: &[Filter::Contour],
            started: "Contour filter in progress",
            done: "Contour filter applied",
        }),
        Caption::SaltAndPepper => PhotoAction::Filter(FilterPlan {
            chain: &[Filter::SaltAndPepper],
            started: "Salt and pepper filter in progress",
            done: "Salt and pepper filter applied",
        }),
        Caption::Mix => PhotoAction::Filter(FilterPlan {
            chain: &[Filter::SaltAndPepper, Filter::Blur],
            started: "Mix filter in progress",
            done: "Mix filter applied",
        }),
        Caption::Predict => PhotoAction::Predict,
    }
}

/// Routes one inbound chat message to the matching reply.
///
/// Holds no state between messages; every collaborator is injected.
pub struct Dispatcher {
    chat: Arc<dyn ChatTransport>,
    filters: Arc<dyn ImageFilters>,
    submitter: Arc<JobSubmitter>,
    trivia: Arc<dyn TriviaSource>,
    download_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        filters: Arc<dyn ImageFilters>,
        submitter: Arc<JobSubmitter>,
        trivia: Arc<dyn TriviaSource>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chat,
            filters,
            submitter,
            trivia,
            download_dir: download_dir.into(),
        }
    }

    /// Handle a message to completion. Failures are logged, never returned,
    /// so the webhook can always acknowledge the update.
    pub async fn handle(&self, msg: &ChatMessage) {
        let chat_id = msg.chat_id;
        let outcome = match (&msg.text, &msg.caption) {
            (Some(text), _) => self.handle_text(chat_id, text).await,
            (None, Some(caption)) => self.handle_photo(msg, caption).await,
            (None, None) => self
                .chat
                .send_text(chat_id, PROMPT_TEXT)
                .await
                .map_err(DispatchError::from),
        };

        if let Err(e) = outcome {
            tracing::error!(%chat_id, error = %e, "Failed to reply to chat message");
        }
    }

    async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<(), DispatchError> {
        let command = classify_text(text);
        tracing::debug!(%chat_id, ?command, "Text message received");

        let reply = match command {
            TextCommand::Joke => format!("Here's a joke for you: {}", self.trivia.joke().await),
            TextCommand::Fact => format!("Did you know? {}", self.trivia.fact().await),
            TextCommand::Help => HELP_TEXT.to_string(),
            TextCommand::Echo => format!("{ECHO_PREFIX}{text}"),
        };

        self.chat.send_text(chat_id, &reply).await?;
        Ok(())
    }

    async fn handle_photo(&self, msg: &ChatMessage, caption: &str) -> Result<(), DispatchError> {
        // Each message gets its own directory: the same photo may arrive twice at once.
        let work_dir = self.download_dir.join(Uuid::new_v4().to_string());

        let outcome = match self.process_photo(msg, caption, &work_dir).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(chat_id = %msg.chat_id, caption, error = %e, "Failed to process photo");
                self.chat
                    .send_text(msg.chat_id, FAILURE_TEXT)
                    .await
                    .map_err(DispatchError::from)
            }
        };

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %work_dir.display(), error = %e, "Failed to remove photo work directory");
            }
        }
        outcome
    }

    async fn process_photo(
        &self,
        msg: &ChatMessage,
        caption: &str,
        work_dir: &Path,
    ) -> Result<(), DispatchError> {
        let file_ref = msg.photo_ref.as_deref().ok_or(DispatchError::PhotoExpected)?;
        let image = self.chat.download_photo(file_ref, work_dir).await?;
        tracing::info!(chat_id = %msg.chat_id, caption, path = %image.display(), "Photo downloaded");

        let Ok(caption) = Caption::from_str(caption) else {
            self.chat.send_text(msg.chat_id, USAGE_TEXT).await?;
            return Ok(());
        };

        match action_for(caption) {
            PhotoAction::Filter(plan) => self.apply_filters(msg.chat_id, &image, plan).await,
            PhotoAction::Predict => self.predict(msg.chat_id, &image).await,
        }
    }

    async fn apply_filters(
        &self,
        chat_id: ChatId,
        image: &Path,
        plan: FilterPlan,
    ) -> Result<(), DispatchError> {
        self.chat.send_text(chat_id, plan.started).await?;

        let mut current = image.to_path_buf();
        for filter in plan.chain {
            let next = self.filters.apply(*filter, &current).await?;
            current = next;
        }

        self.chat.send_photo(chat_id, &current).await?;
        self.chat.send_text(chat_id, plan.done).await?;
        Ok(())
    }

    async fn predict(&self, chat_id: ChatId, image: &Path) -> Result<(), DispatchError> {
        self.chat.send_text(chat_id, PREDICT_ACK_TEXT).await?;

        if let Err(e) = self.submitter.submit(image, chat_id).await {
            tracing::warn!(%chat_id, error = %e, "Reporting failed prediction submission to chat");
            self.chat.send_text(chat_id, SUBMIT_FAILED_TEXT).await?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Message content of type 'photo' expected")]
    PhotoExpected,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Transform(#[from] FilterError),
}
