//! Rate limited HTTP client with exponential-backoff retry
//!
//! Each attempt first takes a token from the optional [`RateLimiter`], then
//! runs one request through the transport under the session timeout.
//! Transport failures sleep `backoff_start * 2^(k-1)` and try again until the
//! attempt budget is spent; anything else is returned immediately.

use common::constants::{DEFAULT_RATE_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::error::HttpError;
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use super::transport::{HttpRequest, HttpTransport, ReqwestTransport};

/// Client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Permits per `rate_interval`; `None` disables rate limiting
    pub rate_limit: Option<u32>,
    pub rate_interval: Duration,
    /// Total timeout of a single attempt
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            rate_limit: None,
            rate_interval: Duration::from_secs(DEFAULT_RATE_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Retrying HTTP client.
///
/// Opening the client creates the session and starts the limiter; [`close`]
/// stops the limiter and ends the session, after which every request fails
/// with [`HttpError::Closed`]. A client dropped without `close` still aborts
/// the limiter's refill task.
///
/// [`close`]: RetryingHttpClient::close
#[derive(Debug)]
pub struct RetryingHttpClient<T = ReqwestTransport> {
    transport: T,
    policy: RetryPolicy,
    rate_limiter: Option<RateLimiter>,
    closed: AtomicBool,
}

impl RetryingHttpClient<ReqwestTransport> {
    /// Open a client over a fresh `reqwest` session
    pub fn open(config: HttpClientConfig) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::with_transport(config, transport)
    }
}

impl<T: HttpTransport> RetryingHttpClient<T> {
    /// Open a client over an existing transport. Must run inside a Tokio runtime.
    pub fn with_transport(config: HttpClientConfig, transport: T) -> Result<Self, HttpError> {
        let rate_limiter = match config.rate_limit {
            Some(rate_limit) => {
                let limiter = RateLimiter::new(rate_limit, config.rate_interval)?;
                limiter.start()?;
                Some(limiter)
            }
            None => None,
        };

        Ok(Self {
            transport,
            policy: config.retry,
            rate_limiter,
            closed: AtomicBool::new(false),
        })
    }

    /// Perform one logical request
    pub async fn request(&self, request: HttpRequest) -> Result<Value, HttpError> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            if self.is_closed() {
                return Err(HttpError::Closed);
            }
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire().await?;
            }

            match self.transport.send(&request).await {
                Ok(body) => {
                    debug!(method = %request.method, url = %request.url, attempt, "Request succeeded");
                    return Ok(body);
                }
                Err(err) if self.policy.is_retryable(&err) => {
                    if attempt >= attempts {
                        error!(
                            method = %request.method,
                            url = %request.url,
                            attempts,
                            "All attempts failed: {}",
                            err
                        );
                        return Err(HttpError::RetriesExhausted {
                            attempts,
                            source: Box::new(err),
                        });
                    }

                    let delay = self.policy.backoff(attempt);
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying: {}",
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(method = %request.method, url = %request.url, "Request failed: {}", err);
                    return Err(err);
                }
            }
        }
    }

    /// GET `url` with query parameters
    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, HttpError> {
        let request = query
            .iter()
            .fold(HttpRequest::get(url), |request, (key, value)| {
                request.query(*key, *value)
            });
        self.request(request).await
    }

    /// End the session and stop the rate limiter. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(limiter) = &self.rate_limiter {
            limiter.stop().await;
        }
        debug!("HTTP client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The attached rate limiter
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
