//! Outbound HTTP plumbing

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod retry;
pub mod transport;

pub use client::{HttpClientConfig, RetryingHttpClient};
pub use error::{HttpError, RateLimitError, TransportErrorKind};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpTransport, ReqwestTransport};
