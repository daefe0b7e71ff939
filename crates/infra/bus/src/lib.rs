//! Durable publish/subscribe over a topic exchange
//!
//! Brokers deliver at least once. Every subscription checks an
//! [`IdempotencyStore`] before invoking its handler and marks the event
//! processed only after the handler succeeds, so each `event_id` reaches a
//! handler at most once while its record lives.

#![forbid(unsafe_code)]

pub mod broker;
pub mod dispatch;
pub mod error;
pub mod event_bus;
pub mod handler;
pub mod idempotency;

pub use broker::{AmqpBroker, Delivery, DeliveryStream, InMemoryBroker, MessageBroker};
pub use dispatch::{Disposition, Outcome, process_message};
pub use error::{BusError, BusResult};
pub use event_bus::EventBus;
pub use handler::{EventHandler, EventPublisher, EventPublisherExt};
pub use idempotency::{IdempotencyStore, InMemoryIdempotencyStore, RedisIdempotencyStore};
