//! EODHD client configuration

use common::constants::{EODHD_BASE_URL, EODHD_RATE_LIMIT};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::http::HttpClientConfig;

/// EODHD configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EodhdConfig {
    /// API token sent as `api_token`
    pub api_key: String,
    /// API root, without trailing slash
    pub base_url: String,
    /// Calls per minute
    pub rate_limit: u32,
}

impl fmt::Debug for EodhdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EodhdConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl EodhdConfig {
    /// Configuration for the public API with the standard plan limit
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: EODHD_BASE_URL.to_string(),
            rate_limit: EODHD_RATE_LIMIT,
        }
    }

    /// Override the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// HTTP settings: the per-minute limit plus default timeout and retry
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            rate_limit: Some(self.rate_limit),
            ..Default::default()
        }
    }
}
