use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::job::JobDescriptor;

/// Producer side of the prediction queue. Delivery to workers is at-least-once.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), QueueError>;

    /// Check connectivity (for health checks).
    async fn health_check(&self) -> Result<(), QueueError>;
}

/// Redis-backed job queue. Workers pop from the right end of the list.
pub struct JobQueue {
    client: redis::Client,
    queue_key: String,
}

impl JobQueue {
    pub fn new(redis_url: &str, queue_key: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            queue_key: queue_key.into(),
        })
    }
}

#[async_trait]
impl JobPublisher for JobQueue {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(&self.queue_key, &payload)
            .await
            .map_err(QueueError::Redis)?;

        if let Ok(depth) = conn.llen::<_, u64>(&self.queue_key).await {
            metrics::gauge!("prediction_queue_depth").set(depth as f64);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
