//! Handler and publisher ports

use async_trait::async_trait;
use common::{DomainEvent, EncodedEvent, Event};
use serde_json::Value;

use crate::error::BusResult;

/// Processes events of one type
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Event type this handler consumes
    fn event_type(&self) -> &str;

    /// Handler name for logs
    fn name(&self) -> &str {
        self.event_type()
    }

    /// Handle a parsed event payload.
    ///
    /// # Errors
    /// Any error causes the message to be rejected with requeue.
    async fn handle(&self, payload: Value) -> anyhow::Result<()>;
}

/// Publishes encoded events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an encoded event with its type as routing key
    ///
    /// # Errors
    /// Broker failures are returned to the caller; there is no local retry.
    async fn publish_encoded(&self, event: EncodedEvent) -> BusResult<()>;
}

/// Typed publishing on top of [`EventPublisher`]
#[async_trait]
pub trait EventPublisherExt {
    /// Encode and publish `event`
    async fn publish_event<P: DomainEvent>(&self, event: &Event<P>) -> BusResult<()>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisherExt for T {
    async fn publish_event<P: DomainEvent>(&self, event: &Event<P>) -> BusResult<()> {
        let encoded = event.encode()?;
        self.publish_encoded(encoded).await
    }
}
