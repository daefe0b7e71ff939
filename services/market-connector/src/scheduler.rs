//! Periodic update trigger

use bus::{EventPublisher, EventPublisherExt};
use common::{Event, UpdateFinancialInstruments};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Publishes `UpdateFinancialInstruments` once per period.
///
/// The first event goes out one full period after the scheduler starts.
pub struct UpdateScheduler {
    publisher: Arc<dyn EventPublisher>,
    period: Duration,
}

impl UpdateScheduler {
    pub fn new(publisher: Arc<dyn EventPublisher>, period: Duration) -> Self {
        Self { publisher, period }
    }

    /// Run on a background task until `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = self.period.as_secs(), "Update scheduler started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => self.publish_update().await,
            }
        }
        debug!("Update scheduler stopped");
    }

    async fn publish_update(&self) {
        let event = Event::new(UpdateFinancialInstruments::default());
        match self.publisher.publish_event(&event).await {
            Ok(()) => info!(event_id = event.event_id(), "Scheduled instrument update published"),
            // The next period tries again
            Err(e) => error!("Failed to publish scheduled update: {}", e),
        }
    }
}
