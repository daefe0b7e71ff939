//! Event bus over a [`MessageBroker`]
//!
//! `open` initializes the idempotency store and connects the broker; `close`
//! stops every subscription and releases both. Subscriptions run on their
//! own tasks until the bus is closed or the broker ends the stream.

use async_trait::async_trait;
use common::{DomainEvent, EncodedEvent, Event, queue_name};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{Delivery, DeliveryStream, MessageBroker};
use crate::dispatch::{Disposition, process_message};
use crate::error::{BusError, BusResult};
use crate::handler::{EventHandler, EventPublisher};
use crate::idempotency::IdempotencyStore;

/// First wait before consuming again after a failed resubscribe
const RESUBSCRIBE_BACKOFF_START: Duration = Duration::from_millis(100);

/// Cap on the resubscribe wait
const RESUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Durable publish/subscribe with idempotent handler invocation
pub struct EventBus {
    broker: Arc<dyn MessageBroker>,
    store: Arc<dyn IdempotencyStore>,
    shutdown: CancellationToken,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.consumers.lock().len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(broker: Arc<dyn MessageBroker>, store: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            broker,
            store,
            shutdown: CancellationToken::new(),
            consumers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Initialize the idempotency store, then connect the broker
    ///
    /// # Errors
    /// Store or broker connection failures.
    pub async fn open(&self) -> BusResult<()> {
        self.ensure_open()?;
        self.store.initialize().await?;
        self.broker.connect().await?;
        info!("Event bus opened");
        Ok(())
    }

    /// Publish `event` with its type as routing key
    ///
    /// # Errors
    /// Encoding or broker failures; nothing is retried here.
    pub async fn publish<P: DomainEvent>(&self, event: &Event<P>) -> BusResult<()> {
        self.publish_encoded(event.encode()?).await
    }

    /// Consume `{event_type}_queue`, bound with `event_type`, into `handler`
    ///
    /// # Errors
    /// Queue declaration, binding or consume failures.
    pub async fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> BusResult<()> {
        self.ensure_open()?;
        self.broker.connect().await?;

        let queue = queue_name(event_type);
        let deliveries = self.broker.consume(&queue, event_type).await?;

        let subscription = Subscription {
            queue: queue.clone(),
            routing_key: event_type.to_string(),
            broker: Arc::clone(&self.broker),
            store: Arc::clone(&self.store),
            handler,
        };
        let consumer = tokio::spawn(subscription.run(deliveries, self.shutdown.child_token()));
        self.consumers.lock().push(consumer);

        info!(queue = %queue, event_type, "Subscribed to events");
        Ok(())
    }

    /// Number of running subscriptions
    pub fn subscription_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// Token cancelled when the bus closes
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop subscriptions, then close the broker and the store. Safe to call twice.
    ///
    /// # Errors
    /// The first broker or store close failure; both are always attempted.
    pub async fn close(&self) -> BusResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shutdown.cancel();
        let consumers = std::mem::take(&mut *self.consumers.lock());
        for consumer in consumers {
            if let Err(e) = consumer.await {
                error!("Subscription task failed: {}", e);
            }
        }

        let broker = self.broker.close().await;
        let store = self.store.close().await;
        info!("Event bus closed");
        broker.and(store)
    }

    fn ensure_open(&self) -> BusResult<()> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish_encoded(&self, event: EncodedEvent) -> BusResult<()> {
        self.ensure_open()?;
        self.broker.connect().await?;
        self.broker.publish(&event.event_type, event.body).await?;
        info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "Published event"
        );
        Ok(())
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// One consumer task. A stream that ends while the bus is open (the broker
/// dropped the channel or connection) is consumed again, so a subscription
/// lives until the bus closes.
struct Subscription {
    queue: String,
    routing_key: String,
    broker: Arc<dyn MessageBroker>,
    store: Arc<dyn IdempotencyStore>,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    async fn run(self, mut deliveries: DeliveryStream, shutdown: CancellationToken) {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => settle(delivery, self.store.as_ref(), self.handler.as_ref()).await,
                Some(Err(e)) => error!(queue = %self.queue, "Failed to receive delivery: {}", e),
                None => {
                    warn!(queue = %self.queue, "Delivery stream ended, resubscribing");
                    match self.resubscribe(&shutdown).await {
                        Some(resumed) => deliveries = resumed,
                        None => break,
                    }
                }
            }
        }
        debug!(queue = %self.queue, "Subscription stopped");
    }

    /// Consume the queue again, backing off between failures. `None` once shut down.
    async fn resubscribe(&self, shutdown: &CancellationToken) -> Option<DeliveryStream> {
        let mut delay = RESUBSCRIBE_BACKOFF_START;
        loop {
            if shutdown.is_cancelled() {
                return None;
            }
            match self.broker.consume(&self.queue, &self.routing_key).await {
                Ok(deliveries) => {
                    info!(queue = %self.queue, "Resubscribed to events");
                    return Some(deliveries);
                }
                Err(BusError::Closed) => return None,
                Err(e) => {
                    warn!(
                        queue = %self.queue,
                        delay_ms = delay.as_millis() as u64,
                        "Resubscribe failed: {}",
                        e
                    );
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(RESUBSCRIBE_BACKOFF_MAX);
        }
    }
}

async fn settle(delivery: Box<dyn Delivery>, store: &dyn IdempotencyStore, handler: &dyn EventHandler) {
    let body = delivery.body().to_vec();
    if delivery.redelivered() {
        debug!(
            handler = handler.name(),
            routing_key = delivery.routing_key(),
            "Processing redelivered message"
        );
    }
    let disposition = match process_message(&body, store, handler).await {
        Ok(outcome) => outcome.disposition(),
        Err(e) => {
            error!(
                handler = handler.name(),
                routing_key = delivery.routing_key(),
                "Idempotency store failed, requeueing message: {}",
                e
            );
            Disposition::Reject { requeue: true }
        }
    };

    let settled = match disposition {
        Disposition::Ack => delivery.ack().await,
        Disposition::Reject { requeue } => delivery.reject(requeue).await,
    };
    if let Err(e) = settled {
        error!(handler = handler.name(), "Failed to settle message: {}", e);
    }
}
