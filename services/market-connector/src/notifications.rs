//! Outbound notifications

use async_trait::async_trait;
use feeds::{HttpClientConfig, HttpError, HttpRequest, RetryingHttpClient};
use serde_json::json;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TelegramConfig;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The API answered but refused the message
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Delivers a human readable message somewhere
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_notification(&self, text: &str) -> Result<(), NotificationError>;

    /// Release transport resources
    async fn close(&self) {}
}

/// Telegram Bot API sender
pub struct TelegramNotifier {
    http: RetryingHttpClient,
    send_url: String,
    bot_token: String,
    chat_id: String,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn open(config: TelegramConfig, http_config: HttpClientConfig) -> Result<Self, NotificationError> {
        let http = RetryingHttpClient::open(http_config)?;
        Ok(Self {
            http,
            send_url: format!("{}/bot{}/sendMessage", config.api_url, config.bot_token),
            bot_token: config.bot_token,
            chat_id: config.chat_id,
        })
    }

    fn redact(&self, error: HttpError) -> HttpError {
        let hide = |text: String| text.replace(self.bot_token.as_str(), "<redacted>");
        match error {
            HttpError::Transport { kind, url, message } => HttpError::Transport {
                kind,
                url: hide(url),
                message: hide(message),
            },
            HttpError::Status { status, url } => HttpError::Status { status, url: hide(url) },
            HttpError::Decode { url, message } => HttpError::Decode {
                url: hide(url),
                message: hide(message),
            },
            HttpError::RetriesExhausted { attempts, source } => HttpError::RetriesExhausted {
                attempts,
                source: Box::new(self.redact(*source)),
            },
            other => other,
        }
    }
}

#[async_trait]
impl NotificationSender for TelegramNotifier {
    async fn send_notification(&self, text: &str) -> Result<(), NotificationError> {
        let request = HttpRequest::post(self.send_url.as_str()).json(json!({
            "chat_id": self.chat_id,
            "text": text,
        }));

        // The token is part of the URL, so errors are reported without it
        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| self.redact(e))?;
        if response.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let description = response
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no description")
                .to_string();
            return Err(NotificationError::Rejected(description));
        }

        debug!(chat_id = %self.chat_id, "Telegram notification sent");
        Ok(())
    }

    async fn close(&self) {
        self.http.close().await;
    }
}

/// Sender used when Telegram is not configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send_notification(&self, text: &str) -> Result<(), NotificationError> {
        info!(text, "Notification");
        Ok(())
    }
}
