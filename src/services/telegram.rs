use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

use crate::models::chat::ChatId;

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError>;

    async fn send_photo(&self, chat_id: ChatId, image_path: &Path) -> Result<(), ChatError>;

    /// Download the referenced photo into `dest_dir` and return its local path.
    async fn download_photo(&self, file_ref: &str, dest_dir: &Path) -> Result<PathBuf, ChatError>;
}

/// Client for the Telegram Bot API.
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, ChatError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChatError::Api {
                method: method.to_string(),
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[derive(Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    id: i64,
    username: Option<String>,
}

/// Upper bound for one Bot API call, file downloads included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before retrying attempt `attempt` (zero-based) of the webhook probe.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

// The bot token is part of every API URL, keep it out of error messages.
fn http_error(e: reqwest::Error) -> ChatError {
    ChatError::Http(e.without_url())
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(http_error)?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, ChatError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(http_error)?;

        let envelope: ApiResponse<T> = response.json().await.map_err(http_error)?;
        envelope.into_result(method)
    }

    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &str,
        form: Form,
    ) -> Result<T, ChatError> {
        let response = self
            .http
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(http_error)?;

        let envelope: ApiResponse<T> = response.json().await.map_err(http_error)?;
        envelope.into_result(method)
    }

    /// Point Telegram at `webhook_url`.
    ///
    /// Any existing webhook is removed first, then the URL is probed with
    /// exponential backoff for up to `max_attempts` tries. If it never answers
    /// the webhook is left unset and an error is returned.
    pub async fn register_webhook(
        &self,
        webhook_url: &str,
        certificate: Option<&Path>,
        max_attempts: u32,
    ) -> Result<(), ChatError> {
        match self
            .call::<bool>("deleteWebhook", &serde_json::json!({}))
            .await
        {
            Ok(_) => tracing::info!("Existing webhook removed"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove existing webhook"),
        }

        sleep(Duration::from_millis(500)).await;

        self.probe_webhook(webhook_url, max_attempts).await?;

        let mut form = Form::new().text("url", webhook_url.to_string());
        if let Some(path) = certificate {
            let cert = tokio::fs::read(path).await?;
            form = form.part("certificate", Part::bytes(cert).file_name("cert.pem"));
        }
        self.call_multipart::<bool>("setWebhook", form).await?;
        tracing::info!("Webhook set");

        match self.call::<BotUser>("getMe", &serde_json::json!({})).await {
            Ok(me) => tracing::info!(bot_id = me.id, username = ?me.username, "Telegram bot information"),
            Err(e) => tracing::warn!(error = %e, "Failed to fetch bot information"),
        }

        Ok(())
    }

    async fn probe_webhook(&self, webhook_url: &str, max_attempts: u32) -> Result<(), ChatError> {
        for attempt in 0..max_attempts {
            match self
                .http
                .get(webhook_url)
                .timeout(Duration::from_secs(10))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(attempt = attempt + 1, "Webhook URL reachable");
                    return Ok(());
                }
                Ok(response) => tracing::warn!(
                    attempt = attempt + 1,
                    status = %response.status(),
                    "Webhook URL check failed"
                ),
                Err(e) => tracing::warn!(
                    attempt = attempt + 1,
                    error = %e.without_url(),
                    "Error checking webhook URL"
                ),
            }

            if attempt + 1 < max_attempts {
                sleep(backoff_delay(attempt)).await;
            }
        }

        Err(ChatError::WebhookUnreachable {
            attempts: max_attempts,
        })
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        self.call::<serde_json::Value>(
            "sendMessage",
            &serde_json::json!({ "chat_id": chat_id, "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, image_path: &Path) -> Result<(), ChatError> {
        let data = tokio::fs::read(image_path).await?;
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.jpg")
            .to_string();

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", Part::bytes(data).file_name(file_name));

        self.call_multipart::<serde_json::Value>("sendPhoto", form)
            .await?;
        Ok(())
    }

    async fn download_photo(&self, file_ref: &str, dest_dir: &Path) -> Result<PathBuf, ChatError> {
        let info: FileInfo = self
            .call("getFile", &serde_json::json!({ "file_id": file_ref }))
            .await?;
        let remote_path = info.file_path.ok_or_else(|| ChatError::Api {
            method: "getFile".to_string(),
            description: "file is not available for download".to_string(),
        })?;

        let data = self
            .http
            .get(format!(
                "{}/file/bot{}/{}",
                self.api_url, self.token, remote_path
            ))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_error)?
            .bytes()
            .await
            .map_err(http_error)?;

        let file_name = Path::new(&remote_path)
            .file_name()
            .ok_or_else(|| ChatError::Api {
                method: "getFile".to_string(),
                description: format!("unexpected file path {remote_path}"),
            })?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let local_path = dest_dir.join(file_name);
        tokio::fs::write(&local_path, &data).await?;

        tracing::debug!(path = %local_path.display(), bytes = data.len(), "Photo downloaded");
        Ok(local_path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("Telegram API call {method} failed: {description}")]
    Api { method: String, description: String },

    #[error("Webhook URL unreachable after {attempts} attempts")]
    WebhookUnreachable { attempts: u32 },

    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let delays: Vec<u64> = (0..5).map(|a| backoff_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(40), Duration::from_secs(64));
    }

    #[test]
    fn test_api_error_envelope() {
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }))
        .unwrap();

        let err = envelope.into_result("sendMessage").unwrap_err();
        assert!(err.to_string().contains("chat not found"));
        assert!(err.to_string().contains("sendMessage"));
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(
            client.method_url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }
}
