use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8443"). Unused by the janitor.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string (result store and submission ledger)
    pub database_url: String,

    /// Redis connection string for the prediction queue
    pub redis_url: String,

    /// Redis list the detection worker consumes
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Telegram bot token
    pub telegram_token: String,

    /// Public base URL Telegram posts updates to
    pub telegram_app_url: String,

    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Self-signed certificate uploaded with the webhook registration
    pub tls_cert_path: Option<PathBuf>,

    /// Bucket receiving images submitted for prediction
    pub bucket_name: String,

    pub region_name: String,

    /// Custom S3-compatible endpoint; AWS is used when unset
    pub s3_endpoint: Option<String>,

    pub aws_access_key_id: Option<String>,

    pub aws_secret_access_key: Option<String>,

    /// Local directory for downloaded and filtered photos
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Seconds a prediction may stay without a result before the chat is told it failed
    #[serde(default = "default_prediction_ttl_secs")]
    pub prediction_ttl_secs: u64,

    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,

    /// Attempts made while probing the webhook URL before giving up
    #[serde(default = "default_webhook_max_attempts")]
    pub webhook_max_attempts: u32,

    #[serde(default = "default_joke_api_url")]
    pub joke_api_url: String,

    #[serde(default = "default_fact_api_url")]
    pub fact_api_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_queue_key() -> String {
    "polybot:jobs".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("photos")
}

fn default_prediction_ttl_secs() -> u64 {
    3600
}

fn default_janitor_interval_secs() -> u64 {
    60
}

fn default_webhook_max_attempts() -> u32 {
    5
}

fn default_joke_api_url() -> String {
    "https://v2.jokeapi.dev/joke/Any?type=single".to_string()
}

fn default_fact_api_url() -> String {
    "https://uselessfacts.jsph.pl/random.json?language=en".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn prediction_ttl(&self) -> Duration {
        Duration::from_secs(self.prediction_ttl_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    /// URL Telegram delivers updates to. The token in the path keeps it unguessable.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/{}/",
            self.telegram_app_url.trim_end_matches('/'),
            self.telegram_token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_env() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/polybot"),
            ("REDIS_URL", "redis://localhost"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_APP_URL", "https://bot.example.com/"),
            ("BUCKET_NAME", "images"),
            ("REGION_NAME", "eu-west-1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = envy::from_iter(minimal_env()).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8443");
        assert_eq!(config.queue_key, "polybot:jobs");
        assert_eq!(config.download_dir, PathBuf::from("photos"));
        assert_eq!(config.prediction_ttl(), Duration::from_secs(3600));
        assert_eq!(config.webhook_max_attempts, 5);
        assert!(config.s3_endpoint.is_none());
    }

    #[test]
    fn test_webhook_url_trims_trailing_slash() {
        let config: AppConfig = envy::from_iter(minimal_env()).unwrap();
        assert_eq!(config.webhook_url(), "https://bot.example.com/123:abc/");
    }

    #[test]
    fn test_missing_required_field() {
        let env: Vec<_> = minimal_env()
            .into_iter()
            .filter(|(k, _)| k != "TELEGRAM_TOKEN")
            .collect();
        assert!(envy::from_iter::<_, AppConfig>(env).is_err());
    }
}
