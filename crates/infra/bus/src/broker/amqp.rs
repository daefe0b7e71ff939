//! AMQP 0-9-1 broker adapter
//!
//! One connection and one channel per broker, opened on first use and
//! reopened if the server dropped them. The exchange is a durable topic
//! exchange; queues are durable and never auto-deleted.

use async_trait::async_trait;
use common::constants::{DEFAULT_EXCHANGE_NAME, EVENT_CONTENT_TYPE, PERSISTENT_DELIVERY_MODE};
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Delivery, DeliveryStream, MessageBroker};
use crate::error::{BusError, BusResult};

const REPLY_SUCCESS: u16 = 200;

#[derive(Default)]
struct AmqpState {
    connection: Option<Connection>,
    channel: Option<Channel>,
}

/// Broker over an AMQP server such as RabbitMQ
pub struct AmqpBroker {
    url: String,
    exchange: String,
    state: Mutex<AmqpState>,
}

impl std::fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("exchange", &self.exchange)
            .finish_non_exhaustive()
    }
}

impl AmqpBroker {
    /// Broker publishing through the default exchange. Nothing connects until first use.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_exchange(url, DEFAULT_EXCHANGE_NAME)
    }

    pub fn with_exchange(url: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exchange: exchange.into(),
            state: Mutex::new(AmqpState::default()),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    // Holding the state lock across connect keeps concurrent callers on one connection
    async fn channel(&self) -> BusResult<Channel> {
        let mut state = self.state.lock().await;
        if let Some(channel) = state.channel.as_ref().filter(|c| c.status().connected()) {
            return Ok(channel.clone());
        }

        let connection = match state.connection.take() {
            Some(connection) if connection.status().connected() => connection,
            _ => {
                let connection =
                    Connection::connect(&self.url, ConnectionProperties::default()).await?;
                info!("Connected to message broker");
                connection
            }
        };

        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                exchange_options(),
                FieldTable::default(),
            )
            .await?;
        debug!(exchange = %self.exchange, "Declared topic exchange");

        state.connection = Some(connection);
        state.channel = Some(channel.clone());
        Ok(channel)
    }
}

fn exchange_options() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        auto_delete: false,
        ..Default::default()
    }
}

// Manual acknowledgement: deliveries stay unacked until settled
fn consume_options() -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: false,
        ..Default::default()
    }
}

fn publish_properties() -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
        .with_content_type(EVENT_CONTENT_TYPE.into())
}

#[async_trait]
impl MessageBroker for AmqpBroker {
    async fn connect(&self) -> BusResult<()> {
        self.channel().await.map(|_| ())
    }

    async fn publish(&self, routing_key: &str, body: Vec<u8>) -> BusResult<()> {
        let channel = self.channel().await?;
        channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                publish_properties(),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str, routing_key: &str) -> BusResult<DeliveryStream> {
        let channel = self.channel().await?;

        channel
            .queue_declare(
                queue,
                queue_options(),
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queue,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer_tag = format!("{queue}-{}", uuid::Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                consume_options(),
                FieldTable::default(),
            )
            .await?;
        info!(queue, routing_key, consumer_tag = %consumer_tag, "Consuming queue");

        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(|delivery| Box::new(AmqpDelivery(delivery)) as Box<dyn Delivery>)
                    .map_err(BusError::from)
            })
            .boxed())
    }

    async fn close(&self) -> BusResult<()> {
        let mut state = self.state.lock().await;
        let mut result = Ok(());

        if let Some(channel) = state.channel.take() {
            if channel.status().connected() {
                if let Err(e) = channel.close(REPLY_SUCCESS, "Bye").await {
                    warn!("Failed to close broker channel: {}", e);
                    result = Err(e.into());
                }
            }
        }

        if let Some(connection) = state.connection.take() {
            if connection.status().connected() {
                if let Err(e) = connection.close(REPLY_SUCCESS, "Bye").await {
                    warn!("Failed to close broker connection: {}", e);
                    result = result.and(Err(e.into()));
                }
            }
        }

        debug!("Broker connection closed");
        result
    }
}

struct AmqpDelivery(lapin::message::Delivery);

#[async_trait]
impl Delivery for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.0.data
    }

    fn routing_key(&self) -> &str {
        self.0.routing_key.as_str()
    }

    fn redelivered(&self) -> bool {
        self.0.redelivered
    }

    async fn ack(self: Box<Self>) -> BusResult<()> {
        self.0
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(BusError::from)
    }

    async fn reject(self: Box<Self>, requeue: bool) -> BusResult<()> {
        self.0
            .acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(BusError::from)
    }
}
