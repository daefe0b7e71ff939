//! Market data provider access
//!
//! Organized structure:
//! - http/: token-bucket rate limiter and the retrying HTTP client
//! - eodhd/: EODHD REST API client
//! - provider/: provider port shared by all sources

pub mod eodhd;
pub mod http;
pub mod provider;

pub use provider::adapter::{FeedError, MarketDataProvider};
pub use eodhd::{EodhdClient, EodhdConfig};
pub use http::{
    HttpClientConfig, HttpError, HttpRequest, HttpTransport, RateLimitError, RateLimiter,
    ReqwestTransport, RetryPolicy, RetryingHttpClient, TransportErrorKind,
};
