//! Event handlers subscribed by the service

use anyhow::{Context, Result};
use async_trait::async_trait;
use bus::EventHandler;
use common::{DomainEvent, Event, Notification, UpdateFinancialInstruments};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::notifications::NotificationSender;
use crate::service::InstrumentUpdateService;

/// Runs an instrument update for every `UpdateFinancialInstruments` event
pub struct UpdateFinancialInstrumentsHandler {
    service: Arc<InstrumentUpdateService>,
}

impl UpdateFinancialInstrumentsHandler {
    pub fn new(service: Arc<InstrumentUpdateService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for UpdateFinancialInstrumentsHandler {
    fn event_type(&self) -> &str {
        UpdateFinancialInstruments::EVENT_TYPE
    }

    fn name(&self) -> &str {
        "update_financial_instruments"
    }

    async fn handle(&self, payload: Value) -> Result<()> {
        let event = Event::<UpdateFinancialInstruments>::from_value(payload)
            .context("Malformed UpdateFinancialInstruments event")?;
        info!(event_id = event.event_id(), "Initiating scan of financial instruments");

        self.service
            .update_financial_instruments(event.payload().filters.as_deref())
            .await
            .context("Error handling UpdateFinancialInstruments event")
    }
}

/// Forwards `Notification` events to a [`NotificationSender`]
pub struct NotificationHandler {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationHandler {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventHandler for NotificationHandler {
    fn event_type(&self) -> &str {
        Notification::EVENT_TYPE
    }

    fn name(&self) -> &str {
        "notification"
    }

    async fn handle(&self, payload: Value) -> Result<()> {
        let event = Event::<Notification>::from_value(payload).context("Malformed Notification event")?;
        info!(event_id = event.event_id(), "Sending notification");

        self.sender
            .send_notification(&event.payload().text)
            .await
            .context("Error handling Notification event")
    }
}
