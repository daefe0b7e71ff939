//! Token-bucket rate limiter
//!
//! Tokens drip into a bounded bucket at `interval / rate_limit`, so calls are
//! spread evenly across the interval instead of bursting at window edges.
//! The bucket starts empty and only fills once [`RateLimiter::start`] has
//! spawned the refill task.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::RateLimitError;

/// Smoothed token bucket
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    refill_delay: Duration,
    bucket: Arc<Semaphore>,
    active: Arc<AtomicBool>,
    refill: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate_limit` permits per `interval`
    pub fn new(rate_limit: u32, interval: Duration) -> Result<Self, RateLimitError> {
        if rate_limit == 0 {
            return Err(RateLimitError::InvalidRate);
        }
        let refill_delay = interval / rate_limit;
        if refill_delay.is_zero() {
            return Err(RateLimitError::InvalidInterval);
        }

        Ok(Self {
            capacity: rate_limit as usize,
            refill_delay,
            bucket: Arc::new(Semaphore::new(0)),
            active: Arc::new(AtomicBool::new(false)),
            refill: Mutex::new(None),
        })
    }

    /// Spawn the refill task. Must run inside a Tokio runtime; repeated calls are no-ops.
    pub fn start(&self) -> Result<(), RateLimitError> {
        if self.bucket.is_closed() {
            return Err(RateLimitError::Stopped);
        }

        let mut refill = self.refill.lock();
        if refill.is_some() {
            return Ok(());
        }

        self.active.store(true, Ordering::Release);
        let bucket = Arc::clone(&self.bucket);
        let active = Arc::clone(&self.active);
        let capacity = self.capacity;
        let delay = self.refill_delay;

        *refill = Some(tokio::spawn(async move {
            while active.load(Ordering::Acquire) {
                tokio::time::sleep(delay).await;
                // Only this task adds permits, so the check cannot race past capacity
                if bucket.available_permits() < capacity {
                    bucket.add_permits(1);
                }
            }
        }));

        debug!(
            capacity = self.capacity,
            refill_delay_ms = self.refill_delay.as_millis() as u64,
            "Rate limiter started"
        );
        Ok(())
    }

    /// Wait for a token and consume it.
    ///
    /// Fails with [`RateLimitError::Stopped`] once [`RateLimiter::stop`] has
    /// been called, including for callers already waiting.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let permit = self
            .bucket
            .acquire()
            .await
            .map_err(|_| RateLimitError::Stopped)?;
        permit.forget();
        Ok(())
    }

    /// Stop refilling and wait for the refill task to finish. Idempotent and terminal.
    pub async fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.bucket.close();

        let handle = self.refill.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            // Cancelled is the expected outcome
            let _ = handle.await;
            debug!("Rate limiter stopped");
        }
    }

    /// Tokens currently in the bucket
    pub fn available_tokens(&self) -> usize {
        self.bucket.available_permits()
    }

    /// Maximum number of tokens the bucket holds
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Time between two refills
    pub const fn refill_delay(&self) -> Duration {
        self.refill_delay
    }

    /// Whether the refill task is running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether a refill task handle is still held
    pub fn is_running(&self) -> bool {
        self.refill.lock().is_some()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.bucket.close();
        if let Some(handle) = self.refill.get_mut().take() {
            handle.abort();
        }
    }
}
