//! HTTP and rate limiting errors

use std::fmt;
use thiserror::Error;

/// Rate limiter errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Zero permits per interval
    #[error("rate limit must be greater than zero")]
    InvalidRate,

    /// Interval too small to schedule a refill
    #[error("refill interval must be greater than zero")]
    InvalidInterval,

    /// The limiter was stopped; no more tokens will be issued
    #[error("rate limiter has been stopped")]
    Stopped,
}

/// Low-level failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused or reset
    Connect,
    /// Request exceeded the configured timeout
    Timeout,
    /// Any other failure while sending or reading the response
    Request,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Timeout => write!(f, "timeout"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// Errors surfaced by [`crate::RetryingHttpClient`]
#[derive(Error, Debug)]
pub enum HttpError {
    /// Transport failure, retried by the client
    #[error("{kind} error calling {url}: {message}")]
    Transport {
        kind: TransportErrorKind,
        url: String,
        message: String,
    },

    /// Non-2xx response
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body was not valid JSON
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The underlying HTTP session could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// The client was closed
    #[error("HTTP client is closed")]
    Closed,

    /// Every attempt failed with a retryable error
    #[error("all {attempts} attempts failed, last error: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<HttpError>,
    },
}

impl HttpError {
    /// Build a transport error
    pub fn transport(kind: TransportErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// True for connection, timeout and send failures
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
