use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::models::chat::ChatId;
use crate::models::job::{JobDescriptor, SubmissionRecord};
use crate::models::prediction::{Label, PredictionResult};

fn result_from_row(row: &PgRow) -> Result<PredictionResult, sqlx::Error> {
    let labels: Json<Vec<Label>> = row.try_get("labels")?;
    Ok(PredictionResult {
        prediction_id: row.try_get("prediction_id")?,
        chat_id: ChatId(row.try_get("chat_id")?),
        original_img_path: row.try_get("original_img_path")?,
        labels: labels.0,
    })
}

fn submission_from_row(row: &PgRow) -> Result<SubmissionRecord, sqlx::Error> {
    Ok(SubmissionRecord {
        prediction_id: row.try_get("prediction_id")?,
        chat_id: ChatId(row.try_get("chat_id")?),
        image_name: row.try_get("image_name")?,
        submitted_at: row.try_get("submitted_at")?,
        expired_at: row.try_get("expired_at")?,
    })
}

/// Insert a completed prediction. The detection worker owns this write in
/// production; the bot only uses it in tests and tooling.
pub async fn insert_result(pool: &PgPool, result: &PredictionResult) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO prediction_results (prediction_id, chat_id, original_img_path, labels)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(result.prediction_id)
    .bind(result.chat_id.0)
    .bind(&result.original_img_path)
    .bind(Json(&result.labels))
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark an undelivered result as delivered and return it.
///
/// Returns `None` when the row is missing or already claimed. The conditional
/// update makes concurrent callers race for a single winner. The tombstone is
/// only committed once the row has decoded.
pub async fn claim_result(
    pool: &PgPool,
    prediction_id: Uuid,
) -> Result<Option<PredictionResult>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        UPDATE prediction_results
        SET delivered_at = NOW()
        WHERE prediction_id = $1 AND delivered_at IS NULL
        RETURNING prediction_id, chat_id, original_img_path, labels
        "#,
    )
    .bind(prediction_id)
    .fetch_optional(&mut *tx)
    .await?;

    // Dropping the transaction on a decode error rolls the claim back.
    let result = row.as_ref().map(result_from_row).transpose()?;
    tx.commit().await?;

    Ok(result)
}

/// Whether a result row exists, delivered or not.
pub async fn result_exists(pool: &PgPool, prediction_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS (SELECT 1 FROM prediction_results WHERE prediction_id = $1) AS present
        "#,
    )
    .bind(prediction_id)
    .fetch_one(pool)
    .await?;

    row.try_get("present")
}

/// Undo a claim after the outbound send failed.
pub async fn release_result(pool: &PgPool, prediction_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE prediction_results
        SET delivered_at = NULL
        WHERE prediction_id = $1
        "#,
    )
    .bind(prediction_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a job handed to the queue
pub async fn insert_submission(pool: &PgPool, job: &JobDescriptor) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO prediction_submissions (prediction_id, chat_id, image_name)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(job.prediction_id)
    .bind(job.chat_id.0)
    .bind(&job.image_name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a submission that never reached the queue
pub async fn delete_submission(pool: &PgPool, prediction_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM prediction_submissions WHERE prediction_id = $1")
        .bind(prediction_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark submissions older than `ttl` that still have no result as expired,
/// returning the rows this call expired.
pub async fn expire_stale_submissions(
    pool: &PgPool,
    ttl: Duration,
) -> Result<Vec<SubmissionRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        UPDATE prediction_submissions s
        SET expired_at = NOW()
        WHERE s.expired_at IS NULL
          AND s.submitted_at < NOW() - make_interval(secs => $1)
          AND NOT EXISTS (
              SELECT 1 FROM prediction_results r WHERE r.prediction_id = s.prediction_id
          )
        RETURNING s.prediction_id, s.chat_id, s.image_name, s.submitted_at, s.expired_at
        "#,
    )
    .bind(ttl.as_secs_f64())
    .fetch_all(pool)
    .await?;

    rows.iter().map(submission_from_row).collect()
}

/// Get a submission by prediction id
pub async fn get_submission(
    pool: &PgPool,
    prediction_id: Uuid,
) -> Result<Option<SubmissionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT prediction_id, chat_id, image_name, submitted_at, expired_at
        FROM prediction_submissions
        WHERE prediction_id = $1
        "#,
    )
    .bind(prediction_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(submission_from_row).transpose()
}
