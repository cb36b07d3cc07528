use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod results;
pub mod webhook;

/// Build the bot's HTTP routes. The webhook lives under the bot token so only
/// Telegram knows where to post updates.
pub fn router(state: AppState, telegram_token: &str) -> Router {
    let webhook_path = format!("/{telegram_token}/");

    Router::new()
        .route("/", get(health::liveness))
        .route("/health_check", get(health::liveness))
        .route("/health", get(health::health_check))
        .route(
            &webhook_path,
            post(webhook::telegram_webhook).get(webhook::webhook_probe),
        )
        .route("/loadTest/", post(webhook::telegram_webhook))
        .route("/results", post(results::prediction_results))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MB limit
}
