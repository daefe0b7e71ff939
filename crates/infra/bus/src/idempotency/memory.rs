//! In-process idempotency store with the same TTL semantics as Redis

use async_trait::async_trait;
use common::constants::IDEMPOTENCY_TTL_SECS;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::IdempotencyStore;
use crate::error::BusResult;

/// Map of event id to expiry instant
#[derive(Debug)]
pub struct InMemoryIdempotencyStore {
    ttl: Duration,
    records: Mutex<FxHashMap<String, Instant>>,
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(IDEMPOTENCY_TTL_SECS))
    }
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            records: Mutex::new(FxHashMap::default()),
        }
    }

    /// Live records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records
            .lock()
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn initialize(&self) -> BusResult<()> {
        Ok(())
    }

    async fn is_processed(&self, event_id: &str) -> BusResult<bool> {
        let mut records = self.records.lock();
        match records.get(event_id) {
            Some(expires_at) if *expires_at > Instant::now() => Ok(true),
            Some(_) => {
                records.remove(event_id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn mark_as_processed(&self, event_id: &str) -> BusResult<()> {
        self.records
            .lock()
            .insert(event_id.to_string(), Instant::now() + self.ttl);
        Ok(())
    }
}
