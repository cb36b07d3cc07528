use polybot::{
    config::AppConfig,
    db,
    services::{janitor::sweep_expired, store::PgPredictionStore, telegram::TelegramClient},
};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting prediction expiry janitor");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let ledger = PgPredictionStore::new(db_pool);
    let telegram = TelegramClient::new(config.telegram_api_url.clone(), config.telegram_token.clone())
        .expect("Failed to initialize Telegram client");

    let ttl = config.prediction_ttl();
    let interval = config.janitor_interval();
    tracing::info!(ttl_secs = ttl.as_secs(), interval_secs = interval.as_secs(), "Janitor ready");

    loop {
        match sweep_expired(&ledger, &telegram, ttl).await {
            Ok(0) => tracing::trace!("No expired predictions"),
            Ok(expired) => tracing::info!(expired, "Reported expired predictions"),
            Err(e) => tracing::error!(error = %e, "Error sweeping expired predictions, will retry"),
        }
        sleep(interval).await;
    }
}
