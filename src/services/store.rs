use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::db::queries;
use crate::models::job::{JobDescriptor, SubmissionRecord};
use crate::models::prediction::PredictionResult;

/// Outcome of trying to take ownership of a stored result for delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    Claimed(PredictionResult),
    AlreadyDelivered,
    Missing,
}

/// Read side of the result store. Results are written by the detection worker.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Fetch a result and tombstone it in one step. At most one caller ever
    /// receives `Claim::Claimed` for a given id unless it is released.
    async fn claim(&self, prediction_id: Uuid) -> Result<Claim, StoreError>;

    /// Make a claimed result deliverable again.
    async fn release(&self, prediction_id: Uuid) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Tracks accepted jobs so predictions that never complete can be reported.
#[async_trait]
pub trait SubmissionLedger: Send + Sync {
    async fn record(&self, job: &JobDescriptor) -> Result<(), StoreError>;

    async fn discard(&self, prediction_id: Uuid) -> Result<(), StoreError>;

    /// Expire and return submissions older than `ttl` without a result.
    async fn expire_stale(&self, ttl: Duration) -> Result<Vec<SubmissionRecord>, StoreError>;
}

/// PostgreSQL implementation of both the result store and the ledger.
#[derive(Clone)]
pub struct PgPredictionStore {
    pool: PgPool,
}

impl PgPredictionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgPredictionStore {
    async fn claim(&self, prediction_id: Uuid) -> Result<Claim, StoreError> {
        if let Some(result) = queries::claim_result(&self.pool, prediction_id).await? {
            return Ok(Claim::Claimed(result));
        }

        if queries::result_exists(&self.pool, prediction_id).await? {
            Ok(Claim::AlreadyDelivered)
        } else {
            Ok(Claim::Missing)
        }
    }

    async fn release(&self, prediction_id: Uuid) -> Result<(), StoreError> {
        queries::release_result(&self.pool, prediction_id).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionLedger for PgPredictionStore {
    async fn record(&self, job: &JobDescriptor) -> Result<(), StoreError> {
        queries::insert_submission(&self.pool, job).await?;
        Ok(())
    }

    async fn discard(&self, prediction_id: Uuid) -> Result<(), StoreError> {
        queries::delete_submission(&self.pool, prediction_id).await?;
        Ok(())
    }

    async fn expire_stale(&self, ttl: Duration) -> Result<Vec<SubmissionRecord>, StoreError> {
        Ok(queries::expire_stale_submissions(&self.pool, ttl).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
