//! Processed-event records keyed by `event_id`

mod memory;
mod redis_store;

pub use self::memory::InMemoryIdempotencyStore;
pub use self::redis_store::RedisIdempotencyStore;

use async_trait::async_trait;

use crate::error::BusResult;

/// "Seen before" check backing at-most-once processing.
///
/// Errors are never swallowed: a store that cannot answer must fail the
/// operation so the message is not treated as deduplicated.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Establish the backing connection. Idempotent.
    ///
    /// # Errors
    /// Connection failures are returned unmodified.
    async fn initialize(&self) -> BusResult<()>;

    /// Whether `event_id` has a live processed record
    async fn is_processed(&self, event_id: &str) -> BusResult<bool>;

    /// Record `event_id` as processed with the store's TTL
    async fn mark_as_processed(&self, event_id: &str) -> BusResult<()>;

    /// Release the backing connection
    async fn close(&self) -> BusResult<()> {
        Ok(())
    }
}
