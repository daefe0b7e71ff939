//! Redis idempotency store
//!
//! Records are `SET <event_id> processed EX <ttl>`; lookups are `EXISTS`.

use async_trait::async_trait;
use common::constants::{IDEMPOTENCY_TTL_SECS, PROCESSED_MARKER};
use redis::Cmd;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::IdempotencyStore;
use crate::error::BusResult;

/// Redis backed store with a lazily opened, shared connection
pub struct RedisIdempotencyStore {
    url: String,
    ttl_secs: u64,
    connection: Mutex<Option<ConnectionManager>>,
}

impl std::fmt::Debug for RedisIdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisIdempotencyStore")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl RedisIdempotencyStore {
    /// Store with the default 30 day TTL. No connection is made until first use.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_ttl(url, IDEMPOTENCY_TTL_SECS)
    }

    pub fn with_ttl(url: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            url: url.into(),
            ttl_secs,
            connection: Mutex::new(None),
        }
    }

    pub const fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    // The lock is held across connect so concurrent first callers share one connection
    async fn connection(&self) -> BusResult<ConnectionManager> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }

        let client = redis::Client::open(self.url.as_str())?;
        let connection = client.get_connection_manager().await?;
        info!("Connected to idempotency store");
        *guard = Some(connection.clone());
        Ok(connection)
    }
}

fn exists_cmd(event_id: &str) -> Cmd {
    let mut cmd = redis::cmd("EXISTS");
    cmd.arg(event_id);
    cmd
}

fn mark_cmd(event_id: &str, ttl_secs: u64) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(event_id).arg(PROCESSED_MARKER).arg("EX").arg(ttl_secs);
    cmd
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn initialize(&self) -> BusResult<()> {
        self.connection().await.map(|_| ())
    }

    async fn is_processed(&self, event_id: &str) -> BusResult<bool> {
        let mut connection = self.connection().await?;
        let exists: bool = exists_cmd(event_id).query_async(&mut connection).await?;
        Ok(exists)
    }

    async fn mark_as_processed(&self, event_id: &str) -> BusResult<()> {
        let mut connection = self.connection().await?;
        let (): () = mark_cmd(event_id, self.ttl_secs)
            .query_async(&mut connection)
            .await?;
        debug!(event_id, ttl_secs = self.ttl_secs, "Marked event as processed");
        Ok(())
    }

    async fn close(&self) -> BusResult<()> {
        if self.connection.lock().await.take().is_some() {
            debug!("Closed idempotency store connection");
        }
        Ok(())
    }
}
