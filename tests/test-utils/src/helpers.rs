//! Test helper functions and utilities

use anyhow::Result;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

/// Initialize test logging from `RUST_LOG`, writing to the test output.
///
/// Safe to call multiple times - subsequent calls are ignored.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait for a condition to become true with timeout and polling.
///
/// # Arguments
///
/// * `condition` - Function that returns a future evaluating to bool
/// * `timeout_duration` - Maximum time to wait for the condition
/// * `poll_interval` - Time to wait between condition checks
///
/// # Returns
///
/// Ok(()) if condition becomes true, Err if timeout expires
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(timeout_duration, async {
        loop {
            if condition().await {
                return;
            }
            sleep(poll_interval).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("Timeout waiting for condition"))
}

/// Wrap a future with a timeout so a stuck test fails instead of hanging.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl std::future::Future<Output = T>,
) -> Result<T> {
    timeout(duration, future)
        .await
        .map_err(|_| anyhow::anyhow!("Test timeout after {:?}", duration))
}
