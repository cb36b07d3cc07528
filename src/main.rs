use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use polybot::app_state::AppState;
use polybot::config::AppConfig;
use polybot::db;
use polybot::routes;
use polybot::services::{
    dispatcher::Dispatcher,
    filters::ImageProcessor,
    queue::JobQueue,
    result_handler::ResultHandler,
    storage::S3Client,
    store::PgPredictionStore,
    submitter::JobSubmitter,
    telegram::TelegramClient,
    trivia::PublicTriviaClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing polybot server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    // Result store and submission ledger
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PgPredictionStore::new(db_pool));

    tracing::info!(bucket = %config.bucket_name, "Initializing S3 storage client");
    let blobs = S3Client::new(
        &config.bucket_name,
        &config.region_name,
        config.s3_endpoint.as_deref(),
        config.aws_access_key_id.as_deref(),
        config.aws_secret_access_key.as_deref(),
    )
    .expect("Failed to initialize S3 client");

    tracing::info!(queue_key = %config.queue_key, "Connecting to Redis job queue");
    let queue = Arc::new(
        JobQueue::new(&config.redis_url, config.queue_key.clone())
            .expect("Failed to initialize job queue"),
    );

    let telegram = Arc::new(
        TelegramClient::new(config.telegram_api_url.clone(), config.telegram_token.clone())
            .expect("Failed to initialize Telegram client"),
    );

    let trivia = PublicTriviaClient::new(config.joke_api_url.clone(), config.fact_api_url.clone())
        .expect("Failed to initialize trivia client");

    let submitter = JobSubmitter::new(Arc::new(blobs), queue.clone(), store.clone());
    let dispatcher = Dispatcher::new(
        telegram.clone(),
        Arc::new(ImageProcessor),
        Arc::new(submitter),
        Arc::new(trivia),
        config.download_dir.clone(),
    );
    let results = ResultHandler::new(store.clone(), telegram.clone());

    let state = AppState::new(dispatcher, results, store, queue);

    let app: Router = routes::router(state, &config.telegram_token).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    // Registration probes our own webhook route, so it runs once we are listening.
    let webhook_url = config.webhook_url();
    let cert_path = config.tls_cert_path.clone();
    let max_attempts = config.webhook_max_attempts;
    tokio::spawn(async move {
        if let Err(e) = telegram
            .register_webhook(&webhook_url, cert_path.as_deref(), max_attempts)
            .await
        {
            tracing::error!(error = %e, "Webhook registration failed; updates will not be received");
        }
    });

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
