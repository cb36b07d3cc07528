use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::models::prediction::DeliveryOutcome;

#[derive(Debug, Default, Deserialize)]
pub struct ResultsParams {
    #[serde(rename = "predictionId")]
    pub prediction_id: Option<String>,
}

/// POST /results: The detection worker reports a finished prediction.
///
/// `predictionId` is read from the query string, falling back to a JSON body.
/// Any chat id supplied by the caller is ignored.
pub async fn prediction_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsParams>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let prediction_id = query.prediction_id.filter(|id| !id.trim().is_empty()).or_else(|| {
        serde_json::from_slice::<ResultsParams>(&body)
            .ok()
            .and_then(|b| b.prediction_id)
    });

    match state.results.deliver(prediction_id.as_deref()).await {
        Ok(DeliveryOutcome::Delivered | DeliveryOutcome::AlreadyDelivered) => (StatusCode::OK, "Ok"),
        Ok(DeliveryOutcome::MalformedInput) => (StatusCode::BAD_REQUEST, "predictionId is required"),
        Ok(DeliveryOutcome::NotFound) => (StatusCode::NOT_FOUND, "No results found"),
        Err(e) => {
            tracing::error!(error = %e, "Error processing prediction results");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}
