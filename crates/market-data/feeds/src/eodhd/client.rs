//! EODHD REST client
//!
//! Every call carries `api_token` and `fmt=json` and goes through the
//! rate limited, retrying HTTP client.

use async_trait::async_trait;
use common::{EndOfDayRecord, Exchange, Ticker};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, info};

use super::config::EodhdConfig;
use crate::provider::adapter::{FeedError, MarketDataProvider};
use crate::http::{HttpClientConfig, HttpRequest, HttpTransport, ReqwestTransport, RetryingHttpClient};

/// EODHD API client
pub struct EodhdClient<T = ReqwestTransport> {
    api_key: String,
    base_url: String,
    http: RetryingHttpClient<T>,
}

impl<T> fmt::Debug for EodhdClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EodhdClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl EodhdClient<ReqwestTransport> {
    /// Open a client with its own HTTP session and rate limiter
    pub fn open(config: EodhdConfig) -> Result<Self, FeedError> {
        let http_config = config.http_config();
        Self::open_with(config, http_config)
    }

    /// Open a client with explicit HTTP settings
    pub fn open_with(config: EodhdConfig, http_config: HttpClientConfig) -> Result<Self, FeedError> {
        validate(&config)?;
        let http = RetryingHttpClient::open(http_config)?;
        Self::with_client(config, http)
    }
}

impl<T: HttpTransport> EodhdClient<T> {
    /// Wrap an already opened HTTP client
    pub fn with_client(config: EodhdConfig, http: RetryingHttpClient<T>) -> Result<Self, FeedError> {
        validate(&config)?;
        Ok(Self {
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn fetch<D: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<D, FeedError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request = params.iter().fold(
            HttpRequest::get(url)
                .query("api_token", self.api_key.as_str())
                .query("fmt", "json"),
            |request, (key, value)| request.query(*key, *value),
        );

        let body = self.http.request(request).await?;
        serde_json::from_value(body).map_err(|source| FeedError::Malformed {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn validate(config: &EodhdConfig) -> Result<(), FeedError> {
    if config.api_key.trim().is_empty() {
        return Err(FeedError::MissingApiKey("EODHD"));
    }
    Ok(())
}

#[async_trait]
impl<T: HttpTransport + 'static> MarketDataProvider for EodhdClient<T> {
    async fn get_exchanges(&self) -> Result<Vec<Exchange>, FeedError> {
        let exchanges: Vec<Exchange> = self.fetch("exchanges-list/", &[]).await?;
        info!("Fetched {} exchanges", exchanges.len());
        Ok(exchanges)
    }

    async fn get_tickers(&self, exchange_code: &str, delisted: bool) -> Result<Vec<Ticker>, FeedError> {
        let endpoint = format!("exchange-symbol-list/{exchange_code}");
        let params: &[(&str, &str)] = if delisted { &[("delisted", "1")] } else { &[] };

        let mut tickers: Vec<Ticker> = self.fetch(&endpoint, params).await?;
        for ticker in &mut tickers {
            ticker.exchange_code = exchange_code.to_string();
            ticker.delisted = delisted;
        }

        info!(
            exchange = exchange_code,
            delisted,
            "Fetched {} tickers",
            tickers.len()
        );
        Ok(tickers)
    }

    async fn get_historical_data(&self, symbol: &str) -> Result<Vec<EndOfDayRecord>, FeedError> {
        let rows: Vec<EndOfDayRecord> = self.fetch(&format!("eod/{symbol}"), &[]).await?;
        debug!(symbol, "Fetched {} historical rows", rows.len());
        Ok(rows)
    }

    async fn get_eod_bulk_data(&self, exchange_code: &str) -> Result<Vec<EndOfDayRecord>, FeedError> {
        let endpoint = format!("eod-bulk-last-day/{exchange_code}");
        let rows: Vec<EndOfDayRecord> = self.fetch(&endpoint, &[("filter", "extended")]).await?;
        info!(exchange = exchange_code, "Fetched {} end-of-day rows", rows.len());
        Ok(rows)
    }

    async fn close(&self) {
        self.http.close().await;
    }
}
