//! In-memory collaborators for exercising the bot without Telegram, S3,
//! Redis or PostgreSQL.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use polybot::app_state::AppState;
use polybot::models::chat::{ChatId, ChatMessage};
use polybot::models::job::{JobDescriptor, SubmissionRecord};
use polybot::models::prediction::{Label, PredictionResult};
use polybot::services::dispatcher::Dispatcher;
use polybot::services::filters::{filtered_path, Filter, FilterError, ImageFilters};
use polybot::services::queue::{JobPublisher, QueueError};
use polybot::services::result_handler::ResultHandler;
use polybot::services::storage::{BlobStore, StorageError};
use polybot::services::store::{Claim, ResultStore, StoreError, SubmissionLedger};
use polybot::services::submitter::JobSubmitter;
use polybot::services::telegram::{ChatError, ChatTransport};
use polybot::services::trivia::TriviaSource;

pub const JOKE: &str = "I told a chemistry joke once. No reaction.";
pub const FACT: &str = "Honey never spoils.";

fn unavailable_store() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(ChatId, String),
    Photo(ChatId, PathBuf),
}

/// Records every outbound message; downloads write a small placeholder file.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<Sent>>,
    downloads: AtomicUsize,
    pub fail_sends: AtomicBool,
    /// Latency added to every text send, in milliseconds.
    pub send_delay_ms: AtomicU64,
}

impl RecordingChat {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(_, text) => Some(text),
                Sent::Photo(..) => None,
            })
            .collect()
    }

    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(id, text) if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn photos(&self) -> Vec<PathBuf> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo(_, path) => Some(path),
                Sent::Text(..) => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        let delay = self.send_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChatError::Api {
                method: "sendMessage".to_string(),
                description: "Too Many Requests".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Text(chat_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, image_path: &Path) -> Result<(), ChatError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Photo(chat_id, image_path.to_path_buf()));
        Ok(())
    }

    async fn download_photo(&self, file_ref: &str, dest_dir: &Path) -> Result<PathBuf, ChatError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(format!("{file_ref}.jpg"));
        tokio::fs::write(&path, b"\xFF\xD8\xFFfake-jpeg").await?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail: AtomicBool,
}

impl MemoryBlobStore {
    pub fn keys(&self) -> Vec<String> {
        self.uploads.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, data: &[u8], _content_type: &str) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                status: 403,
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), data.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    published: Mutex<Vec<JobDescriptor>>,
    pub fail: AtomicBool,
}

impl MemoryQueue {
    pub fn published(&self) -> Vec<JobDescriptor> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobPublisher for MemoryQueue {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QueueError::Serialize(serde::de::Error::custom(
                "queue endpoint refused the message",
            )));
        }
        self.published.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Result store and submission ledger in one, like the PostgreSQL store.
#[derive(Default)]
pub struct MemoryStore {
    results: Mutex<HashMap<Uuid, (PredictionResult, bool)>>,
    submissions: Mutex<Vec<JobDescriptor>>,
    claims: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl MemoryStore {
    /// Simulate the detection worker finishing a job.
    pub fn put_result(&self, prediction_id: Uuid, chat_id: ChatId, classes: &[&str]) {
        let result = PredictionResult {
            prediction_id,
            chat_id,
            original_img_path: format!("{prediction_id}/photo.jpg"),
            labels: classes.iter().map(|c| Label::of_class(*c)).collect(),
        };
        self.results
            .lock()
            .unwrap()
            .insert(prediction_id, (result, false));
    }

    pub fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<JobDescriptor> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn claim(&self, prediction_id: Uuid) -> Result<Claim, StoreError> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_store());
        }
        let mut results = self.results.lock().unwrap();
        Ok(match results.get_mut(&prediction_id) {
            None => Claim::Missing,
            Some((_, true)) => Claim::AlreadyDelivered,
            Some((result, delivered)) => {
                *delivered = true;
                Claim::Claimed(result.clone())
            }
        })
    }

    async fn release(&self, prediction_id: Uuid) -> Result<(), StoreError> {
        if let Some((_, delivered)) = self.results.lock().unwrap().get_mut(&prediction_id) {
            *delivered = false;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_store());
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionLedger for MemoryStore {
    async fn record(&self, job: &JobDescriptor) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable_store());
        }
        self.submissions.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn discard(&self, prediction_id: Uuid) -> Result<(), StoreError> {
        self.submissions
            .lock()
            .unwrap()
            .retain(|job| job.prediction_id != prediction_id);
        Ok(())
    }

    /// Every submission without a result counts as stale, whatever the ttl.
    async fn expire_stale(&self, _ttl: Duration) -> Result<Vec<SubmissionRecord>, StoreError> {
        let results = self.results.lock().unwrap();
        let mut submissions = self.submissions.lock().unwrap();
        let (stale, pending): (Vec<_>, Vec<_>) = submissions
            .drain(..)
            .partition(|job| !results.contains_key(&job.prediction_id));
        *submissions = pending;

        let now = chrono::Utc::now();
        Ok(stale
            .into_iter()
            .map(|job| SubmissionRecord {
                prediction_id: job.prediction_id,
                chat_id: job.chat_id,
                image_name: job.image_name,
                submitted_at: now,
                expired_at: Some(now),
            })
            .collect())
    }
}

/// Records the order filters are applied in; never touches pixels.
#[derive(Default)]
pub struct RecordingFilters {
    calls: Mutex<Vec<(Filter, PathBuf)>>,
    pub fail: AtomicBool,
}

impl RecordingFilters {
    pub fn calls(&self) -> Vec<Filter> {
        self.calls.lock().unwrap().iter().map(|(f, _)| *f).collect()
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl ImageFilters for RecordingFilters {
    async fn apply(&self, filter: Filter, source: &Path) -> Result<PathBuf, FilterError> {
        self.calls
            .lock()
            .unwrap()
            .push((filter, source.to_path_buf()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(FilterError::EmptyImage);
        }
        Ok(filtered_path(source))
    }
}

pub struct CannedTrivia;

#[async_trait]
impl TriviaSource for CannedTrivia {
    async fn joke(&self) -> String {
        JOKE.to_string()
    }

    async fn fact(&self) -> String {
        FACT.to_string()
    }
}

/// A fully wired bot over in-memory collaborators.
pub struct Harness {
    pub chat: Arc<RecordingChat>,
    pub blobs: Arc<MemoryBlobStore>,
    pub queue: Arc<MemoryQueue>,
    pub store: Arc<MemoryStore>,
    pub filters: Arc<RecordingFilters>,
    pub submitter: Arc<JobSubmitter>,
    pub state: AppState,
    pub download_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let chat = Arc::new(RecordingChat::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let queue = Arc::new(MemoryQueue::default());
        let store = Arc::new(MemoryStore::default());
        let filters = Arc::new(RecordingFilters::default());
        let download_dir = tempfile::tempdir().expect("Failed to create temp dir");

        let submitter = Arc::new(JobSubmitter::new(blobs.clone(), queue.clone(), store.clone()));
        let dispatcher = Dispatcher::new(
            chat.clone(),
            filters.clone(),
            submitter.clone(),
            Arc::new(CannedTrivia),
            download_dir.path(),
        );
        let results = ResultHandler::new(store.clone(), chat.clone());
        let state = AppState::new(dispatcher, results, store.clone(), queue.clone());

        Self {
            chat,
            blobs,
            queue,
            store,
            filters,
            submitter,
            state,
            download_dir,
        }
    }

    pub async fn handle(&self, msg: ChatMessage) {
        self.state.dispatcher.handle(&msg).await;
    }

    /// Write a photo into the download directory, as a prior download would.
    pub fn local_photo(&self, name: &str) -> PathBuf {
        let path = self.download_dir.path().join(name);
        std::fs::write(&path, b"\xFF\xD8\xFFfake-jpeg").expect("Failed to write photo");
        path
    }
}

/// A webhook body as Telegram posts it for a plain text message.
pub fn text_update(chat_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 3,
            "date": 1735689600,
            "chat": { "id": chat_id, "type": "private", "first_name": "Ada" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "Ada" },
            "text": text
        }
    })
}

pub fn text_message(chat_id: i64, text: &str) -> ChatMessage {
    ChatMessage {
        chat_id: ChatId(chat_id),
        text: Some(text.to_string()),
        photo_ref: None,
        caption: None,
    }
}

pub fn photo_message(chat_id: i64, caption: &str) -> ChatMessage {
    ChatMessage {
        chat_id: ChatId(chat_id),
        text: None,
        photo_ref: Some("file_7".to_string()),
        caption: Some(caption.to_string()),
    }
}
