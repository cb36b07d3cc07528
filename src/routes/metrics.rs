use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the bot's metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "predictions_submitted_total",
        "Prediction jobs uploaded and enqueued"
    );
    metrics::describe_counter!(
        "predictions_submission_failed_total",
        "Prediction jobs that could not be started"
    );
    metrics::describe_counter!(
        "predictions_delivered_total",
        "Prediction results sent to their chat"
    );
    metrics::describe_counter!(
        "predictions_not_found_total",
        "Result callbacks for predictions with no stored result"
    );
    metrics::describe_gauge!(
        "prediction_queue_depth",
        "Jobs waiting in the prediction queue after the last publish"
    );
    metrics::describe_histogram!(
        "image_filter_seconds",
        "Time to apply a synchronous photo filter"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics: Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
