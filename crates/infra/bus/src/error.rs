//! Bus errors

use thiserror::Error;

/// Bus result alias
pub type BusResult<T> = Result<T, BusError>;

/// Errors raised by the bus, its broker adapters and idempotency stores
#[derive(Error, Debug)]
pub enum BusError {
    /// Idempotency store failure, propagated as-is
    #[error("idempotency store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Broker connectivity or protocol failure
    #[error("broker error: {0}")]
    Broker(String),

    /// Event could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation on a closed bus or broker
    #[error("event bus is closed")]
    Closed,
}

impl From<lapin::Error> for BusError {
    fn from(error: lapin::Error) -> Self {
        Self::Broker(error.to_string())
    }
}
