use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::chat::ChatId;
use crate::models::job::JobDescriptor;
use crate::services::queue::JobPublisher;
use crate::services::storage::BlobStore;
use crate::services::store::SubmissionLedger;

/// Hands photos to the detection worker: upload, record, enqueue.
///
/// Holds no per-job state; correlation lives in the queued descriptor and,
/// later, in the result store.
pub struct JobSubmitter {
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn JobPublisher>,
    ledger: Arc<dyn SubmissionLedger>,
}

/// Storage key for an upload. Qualified by the prediction id so two photos
/// with the same file name never overwrite each other.
pub fn blob_key(prediction_id: Uuid, local_image: &Path) -> String {
    let file_name = local_image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{prediction_id}/{file_name}")
}

fn content_type(local_image: &Path) -> &'static str {
    image::ImageFormat::from_path(local_image)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

impl JobSubmitter {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn JobPublisher>,
        ledger: Arc<dyn SubmissionLedger>,
    ) -> Self {
        Self {
            blobs,
            queue,
            ledger,
        }
    }

    /// Submit a downloaded photo for prediction and return its prediction id.
    ///
    /// Not retried here. A caller that retries must let a new id be generated;
    /// resubmitting under the same id is not deduplicated downstream.
    pub async fn submit(&self, local_image: &Path, chat_id: ChatId) -> Result<Uuid, SubmitError> {
        let result = self.submit_inner(local_image, chat_id).await;
        match &result {
            Ok(prediction_id) => {
                metrics::counter!("predictions_submitted_total").increment(1);
                tracing::info!(%prediction_id, %chat_id, "Prediction job submitted");
            }
            Err(e) => {
                metrics::counter!("predictions_submission_failed_total").increment(1);
                tracing::error!(%chat_id, error = %e, "Prediction job submission failed");
            }
        }
        result
    }

    async fn submit_inner(&self, local_image: &Path, chat_id: ChatId) -> Result<Uuid, SubmitError> {
        let prediction_id = Uuid::new_v4();
        let key = blob_key(prediction_id, local_image);

        let data = tokio::fs::read(local_image).await.map_err(SubmitError::failed)?;
        self.blobs
            .upload(&key, &data, content_type(local_image))
            .await
            .map_err(SubmitError::failed)?;
        tracing::debug!(%prediction_id, key = %key, "Image uploaded");

        let job = JobDescriptor {
            prediction_id,
            image_name: key,
            chat_id,
        };

        self.ledger.record(&job).await.map_err(SubmitError::failed)?;

        if let Err(e) = self.queue.enqueue(&job).await {
            if let Err(discard_err) = self.ledger.discard(prediction_id).await {
                tracing::warn!(
                    %prediction_id,
                    error = %discard_err,
                    "Failed to discard ledger entry for unpublished job"
                );
            }
            return Err(SubmitError::failed(e));
        }

        Ok(prediction_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Job submission failed: {0}")]
    JobSubmissionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SubmitError {
    fn failed(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        SubmitError::JobSubmissionFailed(Box::new(e))
    }
}
