//! In-process topic broker
//!
//! Queues outlive consumers and survive `close`, so a re-subscription
//! attaches to the same backlog. Publishing to a key with no bound queue
//! drops the message, as an AMQP topic exchange does.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::topic::topic_matches;
use super::{Delivery, DeliveryStream, MessageBroker};
use crate::error::{BusError, BusResult};

#[derive(Debug, Clone)]
struct QueuedMessage {
    routing_key: String,
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct Queue {
    bindings: Vec<String>,
    tx: mpsc::UnboundedSender<QueuedMessage>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedMessage>>>,
    enqueued: usize,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            bindings: Vec::new(),
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            enqueued: 0,
        }
    }
}

/// A message as it was handed to the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
struct Counters {
    acked: AtomicUsize,
    rejected: AtomicUsize,
    requeued: AtomicUsize,
}

/// Settlement counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: usize,
    pub acked: usize,
    /// Rejections without requeue
    pub rejected: usize,
    pub requeued: usize,
}

/// In-memory broker
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queues: Mutex<FxHashMap<String, Queue>>,
    published: Mutex<Vec<PublishedMessage>>,
    counters: Arc<Counters>,
    closed: AtomicBool,
    /// Cancelled when the emulated connection drops; ends every open stream
    session: Mutex<CancellationToken>,
    consumes: AtomicUsize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `queue` and bind it with `pattern` without consuming
    pub fn bind(&self, queue: &str, pattern: &str) {
        let mut queues = self.queues.lock();
        let entry = queues.entry(queue.to_string()).or_insert_with(Queue::new);
        if !entry.bindings.iter().any(|binding| binding == pattern) {
            entry.bindings.push(pattern.to_string());
        }
    }

    /// Every message published so far, in order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Messages routed into `queue` by publishing (redeliveries excluded)
    pub fn enqueued(&self, queue: &str) -> usize {
        self.queues.lock().get(queue).map_or(0, |queue| queue.enqueued)
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.published.lock().len(),
            acked: self.counters.acked.load(Ordering::Acquire),
            rejected: self.counters.rejected.load(Ordering::Acquire),
            requeued: self.counters.requeued.load(Ordering::Acquire),
        }
    }

    /// Emulate a dropped connection: every open delivery stream ends. Queues
    /// and their backlog survive, and later `consume` calls work again.
    pub fn drop_connection(&self) {
        let session = std::mem::replace(&mut *self.session.lock(), CancellationToken::new());
        session.cancel();
        info!("In-memory broker connection dropped");
    }

    /// Number of successful `consume` calls, resubscriptions included
    pub fn consume_count(&self) -> usize {
        self.consumes.load(Ordering::Acquire)
    }

    /// Deliver raw bytes straight into `queue`, bypassing the exchange
    pub fn inject(&self, queue: &str, routing_key: &str, body: impl Into<Vec<u8>>) -> BusResult<()> {
        let mut queues = self.queues.lock();
        let entry = queues.entry(queue.to_string()).or_insert_with(Queue::new);
        entry.enqueued += 1;
        entry
            .tx
            .send(QueuedMessage {
                routing_key: routing_key.to_string(),
                body: body.into(),
                redelivered: false,
            })
            .map_err(|_| BusError::Broker(format!("queue {queue} is gone")))
    }

    fn ensure_open(&self) -> BusResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn connect(&self) -> BusResult<()> {
        self.ensure_open()
    }

    async fn publish(&self, routing_key: &str, body: Vec<u8>) -> BusResult<()> {
        self.ensure_open()?;

        let mut queues = self.queues.lock();
        for (name, queue) in queues.iter_mut() {
            if queue
                .bindings
                .iter()
                .any(|pattern| topic_matches(pattern, routing_key))
            {
                queue.enqueued += 1;
                queue
                    .tx
                    .send(QueuedMessage {
                        routing_key: routing_key.to_string(),
                        body: body.clone(),
                        redelivered: false,
                    })
                    .map_err(|_| BusError::Broker(format!("queue {name} is gone")))?;
            }
        }
        drop(queues);

        self.published.lock().push(PublishedMessage {
            routing_key: routing_key.to_string(),
            body,
        });
        debug!(routing_key, "Published to in-memory exchange");
        Ok(())
    }

    async fn consume(&self, queue: &str, routing_key: &str) -> BusResult<DeliveryStream> {
        self.ensure_open()?;
        self.bind(queue, routing_key);

        let (rx, requeue) = {
            let queues = self.queues.lock();
            let entry = queues
                .get(queue)
                .ok_or_else(|| BusError::Broker(format!("queue {queue} was not declared")))?;
            (Arc::clone(&entry.rx), entry.tx.clone())
        };
        let counters = Arc::clone(&self.counters);
        let session = self.session.lock().clone();
        self.consumes.fetch_add(1, Ordering::AcqRel);

        let stream = futures::stream::unfold(rx, move |rx| {
            let requeue = requeue.clone();
            let counters = Arc::clone(&counters);
            let session = session.clone();
            async move {
                let message = tokio::select! {
                    biased;
                    _ = session.cancelled() => return None,
                    message = async { rx.lock().await.recv().await } => message?,
                };
                let delivery: Box<dyn Delivery> = Box::new(MemoryDelivery {
                    message,
                    requeue,
                    counters,
                });
                Some((Ok(delivery), rx))
            }
        });

        Ok(stream.boxed())
    }

    async fn close(&self) -> BusResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct MemoryDelivery {
    message: QueuedMessage,
    requeue: mpsc::UnboundedSender<QueuedMessage>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.message.body
    }

    fn routing_key(&self) -> &str {
        &self.message.routing_key
    }

    fn redelivered(&self) -> bool {
        self.message.redelivered
    }

    async fn ack(self: Box<Self>) -> BusResult<()> {
        self.counters.acked.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn reject(self: Box<Self>, requeue: bool) -> BusResult<()> {
        if !requeue {
            self.counters.rejected.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        self.counters.requeued.fetch_add(1, Ordering::AcqRel);
        let MemoryDelivery {
            message,
            requeue: queue,
            ..
        } = *self;
        queue
            .send(QueuedMessage {
                redelivered: true,
                ..message
            })
            .map_err(|_| BusError::Broker("queue is gone".to_string()))
    }
}
