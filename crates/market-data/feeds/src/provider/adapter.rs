//! Provider port used by the ingest service

use async_trait::async_trait;
use common::{EndOfDayRecord, Exchange, Ticker};
use thiserror::Error;

use crate::http::HttpError;

/// Provider errors
#[derive(Error, Debug)]
pub enum FeedError {
    /// Provider credentials are missing
    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error(transparent)]
    Http(#[from] HttpError),

    /// Response JSON did not match the expected shape
    #[error("unexpected response from {endpoint}: {source}")]
    Malformed {
        endpoint: String,
        source: serde_json::Error,
    },
}

/// Reference and end-of-day data source
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// All exchanges the provider covers
    async fn get_exchanges(&self) -> Result<Vec<Exchange>, FeedError>;

    /// Tickers listed on `exchange_code`; `delisted` selects the delisted set
    async fn get_tickers(&self, exchange_code: &str, delisted: bool) -> Result<Vec<Ticker>, FeedError>;

    /// Full end-of-day history for a provider symbol
    async fn get_historical_data(&self, symbol: &str) -> Result<Vec<EndOfDayRecord>, FeedError>;

    /// Last trading day for every ticker on `exchange_code`, with technicals
    async fn get_eod_bulk_data(&self, exchange_code: &str) -> Result<Vec<EndOfDayRecord>, FeedError>;

    /// Release provider resources
    async fn close(&self) {}
}
