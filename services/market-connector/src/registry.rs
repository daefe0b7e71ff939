//! Static handler registry
//!
//! Every handler the service runs is listed in [`HANDLERS`]. Startup builds
//! each entry from a [`HandlerContext`] and subscribes it to its event type.

use anyhow::{Context, Result, bail};
use bus::{EventBus, EventHandler, EventPublisher};
use common::{DomainEvent, Notification, UpdateFinancialInstruments};
use feeds::MarketDataProvider;
use std::sync::Arc;
use storage::UnitOfWorkFactory;
use tracing::{debug, info};

use crate::handlers::{NotificationHandler, UpdateFinancialInstrumentsHandler};
use crate::notifications::NotificationSender;
use crate::service::InstrumentUpdateService;

/// Collaborators handed to handler constructors
#[derive(Clone)]
pub struct HandlerContext {
    pub units: Arc<dyn UnitOfWorkFactory>,
    pub publisher: Arc<dyn EventPublisher>,
    /// `None` when no provider credentials are configured
    pub provider: Option<Arc<dyn MarketDataProvider>>,
    pub notifier: Arc<dyn NotificationSender>,
}

pub type HandlerConstructor = fn(&HandlerContext) -> Result<Arc<dyn EventHandler>>;

/// One registered handler
pub struct HandlerEntry {
    pub event_type: &'static str,
    pub description: &'static str,
    pub build: HandlerConstructor,
}

pub static HANDLERS: &[HandlerEntry] = &[
    HandlerEntry {
        event_type: UpdateFinancialInstruments::EVENT_TYPE,
        description: "Refresh exchanges, tickers and end-of-day data from EODHD",
        build: build_update_handler,
    },
    HandlerEntry {
        event_type: Notification::EVENT_TYPE,
        description: "Forward notifications to Telegram or the log",
        build: build_notification_handler,
    },
];

fn build_update_handler(context: &HandlerContext) -> Result<Arc<dyn EventHandler>> {
    let provider = context
        .provider
        .clone()
        .context("EODHD_API_KEY is required for the update handler")?;
    let service = InstrumentUpdateService::new(
        Arc::clone(&context.units),
        Arc::clone(&context.publisher),
        provider,
    );
    Ok(Arc::new(UpdateFinancialInstrumentsHandler::new(Arc::new(service))))
}

fn build_notification_handler(context: &HandlerContext) -> Result<Arc<dyn EventHandler>> {
    Ok(Arc::new(NotificationHandler::new(Arc::clone(&context.notifier))))
}

/// Build a handler and check it consumes the event type it is registered under
pub fn build_handler(entry: &HandlerEntry, context: &HandlerContext) -> Result<Arc<dyn EventHandler>> {
    let handler = (entry.build)(context)
        .with_context(|| format!("Failed to build handler for {}", entry.event_type))?;
    if handler.event_type() != entry.event_type {
        bail!(
            "Handler {} reports event type {} but is registered for {}",
            handler.name(),
            handler.event_type(),
            entry.event_type
        );
    }
    Ok(handler)
}

/// Subscribe every registered handler. Returns the number of subscriptions.
///
/// # Errors
/// The first construction, verification or subscription failure.
pub async fn subscribe_all(bus: &EventBus, entries: &[HandlerEntry], context: &HandlerContext) -> Result<usize> {
    for entry in entries {
        let handler = build_handler(entry, context)?;
        let name = handler.name().to_string();
        bus.subscribe(entry.event_type, handler)
            .await
            .with_context(|| format!("Failed to subscribe {name} to {}", entry.event_type))?;
        debug!(event_type = entry.event_type, handler = %name, "Subscribed handler");
    }
    info!(handlers = entries.len(), "Event handlers subscribed");
    Ok(entries.len())
}
