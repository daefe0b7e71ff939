//! Message broker port
//!
//! The bus needs a topic exchange, durable named queues bound by routing
//! key, persistent publishing and per-message ack/reject. [`AmqpBroker`]
//! provides that over AMQP 0-9-1; [`InMemoryBroker`] emulates it in process.

mod amqp;
mod memory;
mod topic;

pub use amqp::AmqpBroker;
pub use memory::{BrokerStats, InMemoryBroker, PublishedMessage};
pub use topic::topic_matches;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::BusResult;

/// Stream of deliveries from one queue
pub type DeliveryStream = BoxStream<'static, BusResult<Box<dyn Delivery>>>;

/// One delivered message awaiting settlement
#[async_trait]
pub trait Delivery: Send {
    fn body(&self) -> &[u8];

    fn routing_key(&self) -> &str;

    /// Whether the broker delivered this message before
    fn redelivered(&self) -> bool;

    /// Acknowledge; the broker forgets the message
    async fn ack(self: Box<Self>) -> BusResult<()>;

    /// Reject; with `requeue` the broker delivers it again
    async fn reject(self: Box<Self>, requeue: bool) -> BusResult<()>;
}

/// Topic broker operations used by the bus
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Open the connection and channel and declare the exchange. Idempotent.
    ///
    /// # Errors
    /// Connection and declaration failures.
    async fn connect(&self) -> BusResult<()>;

    /// Publish a persistent JSON message with `routing_key`
    ///
    /// # Errors
    /// Publish failures propagate; there is no retry at this layer.
    async fn publish(&self, routing_key: &str, body: Vec<u8>) -> BusResult<()>;

    /// Declare the durable `queue`, bind it with `routing_key` and start consuming
    async fn consume(&self, queue: &str, routing_key: &str) -> BusResult<DeliveryStream>;

    /// Close channel and connection. Safe to call more than once.
    async fn close(&self) -> BusResult<()>;
}
