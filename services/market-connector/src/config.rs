//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, an optional file,
//! then environment variables (`MESSAGE_BROKER_URL` maps to
//! `message_broker_url`). `main` loads `.env` before any of this runs.

use common::constants::{
    DEFAULT_BACKOFF_START_MS, DEFAULT_EXCHANGE_NAME, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_UPDATE_INTERVAL_HOURS, EODHD_BASE_URL, EODHD_RATE_LIMIT,
    SECS_PER_HOUR,
};
use feeds::{EodhdConfig, HttpClientConfig, RetryPolicy};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Telegram Bot API root
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is present but unusable
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// An optional value is needed by the requested feature
    #[error("{0} is not configured")]
    Missing(&'static str),
}

/// Service configuration
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// AMQP URL of the message broker
    pub message_broker_url: String,
    /// Redis URL of the idempotency store
    pub in_memory_storage_url: String,
    pub eodhd_api_key: Option<String>,
    pub eodhd_base_url: String,
    /// EODHD calls per minute
    pub eodhd_rate_limit: u32,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_url: String,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub http_bind: String,
    pub exchange_name: String,
    pub http_timeout_secs: u64,
    pub http_max_retries: u32,
    pub http_backoff_start_ms: u64,
    pub update_interval_hours: u64,
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("eodhd_api_key", &redacted(&self.eodhd_api_key))
            .field("eodhd_base_url", &self.eodhd_base_url)
            .field("eodhd_rate_limit", &self.eodhd_rate_limit)
            .field("telegram_bot_token", &redacted(&self.telegram_bot_token))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("log_level", &self.log_level)
            .field("http_bind", &self.http_bind)
            .field("exchange_name", &self.exchange_name)
            .field("update_interval_hours", &self.update_interval_hours)
            .finish_non_exhaustive()
    }
}

/// Telegram credentials
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_url", &self.api_url)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from the optional file and the process environment
    ///
    /// # Errors
    /// Missing required keys, unreadable file or failed validation.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(file, config::Environment::default().try_parsing(true))
    }

    /// Load with an explicit environment source
    pub fn load_from(file: Option<&Path>, environment: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("eodhd_base_url", EODHD_BASE_URL)?
            .set_default("eodhd_rate_limit", i64::from(EODHD_RATE_LIMIT))?
            .set_default("telegram_api_url", DEFAULT_TELEGRAM_API_URL)?
            .set_default("log_level", "info")?
            .set_default("http_bind", "0.0.0.0:8000")?
            .set_default("exchange_name", DEFAULT_EXCHANGE_NAME)?
            .set_default("http_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
            .set_default("http_max_retries", i64::from(DEFAULT_MAX_RETRIES))?
            .set_default("http_backoff_start_ms", DEFAULT_BACKOFF_START_MS)?
            .set_default("update_interval_hours", DEFAULT_UPDATE_INTERVAL_HOURS)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder.add_source(environment).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_broker_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "MESSAGE_BROKER_URL",
                reason: "must not be empty".to_string(),
            });
        }
        if self.in_memory_storage_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "IN_MEMORY_STORAGE_URL",
                reason: "must not be empty".to_string(),
            });
        }
        if self.update_interval_hours == 0 {
            return Err(ConfigError::Invalid {
                key: "UPDATE_INTERVAL_HOURS",
                reason: "must be at least one hour".to_string(),
            });
        }
        self.bind_addr().map(|_| ())
    }

    /// Address of the HTTP trigger endpoint
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http_bind.parse().map_err(|e| ConfigError::Invalid {
            key: "HTTP_BIND",
            reason: format!("{e}"),
        })
    }

    /// Timeout and retry settings shared by outbound HTTP clients
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.http_max_retries,
                backoff_start: Duration::from_millis(self.http_backoff_start_ms),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// EODHD settings; fails without an API key
    pub fn eodhd(&self) -> Result<(EodhdConfig, HttpClientConfig), ConfigError> {
        let api_key = self
            .eodhd_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("EODHD_API_KEY"))?;

        let eodhd = EodhdConfig {
            rate_limit: self.eodhd_rate_limit,
            ..EodhdConfig::new(api_key).with_base_url(self.eodhd_base_url.as_str())
        };
        let http = HttpClientConfig {
            rate_limit: Some(eodhd.rate_limit),
            ..self.http_config()
        };
        Ok((eodhd, http))
    }

    /// Telegram settings when both token and chat id are present
    pub fn telegram(&self) -> Option<TelegramConfig> {
        let bot_token = non_empty(self.telegram_bot_token.as_deref())?;
        let chat_id = non_empty(self.telegram_chat_id.as_deref())?;
        Some(TelegramConfig {
            api_url: self.telegram_api_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_hours.saturating_mul(SECS_PER_HOUR))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
