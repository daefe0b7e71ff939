//! Service wiring
//!
//! `serve` owns every long-lived resource: it opens the bus, subscribes the
//! registered handlers, starts the scheduler and the HTTP endpoint, and tears
//! all of it down again once `shutdown` fires or any part fails.

use anyhow::{Context, Result};
use bus::{AmqpBroker, EventBus, EventPublisher, RedisIdempotencyStore};
use common::{Event, UpdateFinancialInstruments};
use feeds::{EodhdClient, MarketDataProvider};
use std::sync::Arc;
use storage::InMemoryStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{AppState, router};
use crate::config::{AppConfig, ConfigError};
use crate::notifications::{LogNotifier, NotificationSender, TelegramNotifier};
use crate::registry::{HANDLERS, HandlerContext, subscribe_all};
use crate::scheduler::UpdateScheduler;

/// Event bus over the configured AMQP broker and Redis store
pub fn event_bus(config: &AppConfig) -> EventBus {
    let broker = AmqpBroker::with_exchange(config.message_broker_url.as_str(), config.exchange_name.as_str());
    let store = RedisIdempotencyStore::new(config.in_memory_storage_url.as_str());
    EventBus::new(Arc::new(broker), Arc::new(store))
}

/// Outbound collaborators shared by the handlers
struct Collaborators {
    provider: Option<Arc<dyn MarketDataProvider>>,
    notifier: Arc<dyn NotificationSender>,
}

impl Collaborators {
    fn open(config: &AppConfig) -> Result<Self> {
        let provider: Option<Arc<dyn MarketDataProvider>> = match config.eodhd() {
            Ok((eodhd, http)) => Some(Arc::new(
                EodhdClient::open_with(eodhd, http).context("Failed to open EODHD client")?,
            )),
            // Handlers that need the provider fail when they are built
            Err(ConfigError::Missing(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let notifier: Arc<dyn NotificationSender> = match config.telegram() {
            Some(telegram) => Arc::new(
                TelegramNotifier::open(telegram, config.http_config())
                    .context("Failed to open Telegram notifier")?,
            ),
            None => {
                info!("Telegram is not configured, notifications go to the log");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self { provider, notifier })
    }

    async fn close(&self) {
        if let Some(provider) = &self.provider {
            provider.close().await;
        }
        self.notifier.close().await;
    }
}

/// Run the service until `shutdown` is cancelled
///
/// # Errors
/// Startup failures, or the HTTP server failing while running.
pub async fn serve(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    let bus = Arc::new(event_bus(&config));
    if let Err(e) = bus.open().await {
        close_bus(&bus).await;
        return Err(e).context("Failed to open event bus");
    }

    let collaborators = match Collaborators::open(&config) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            close_bus(&bus).await;
            return Err(e);
        }
    };

    let result = run(&config, &bus, &collaborators, shutdown).await;

    // In-flight handlers finish before the clients they use are closed
    close_bus(&bus).await;
    collaborators.close().await;
    if let Err(e) = &result {
        error!("Service stopped with error: {:#}", e);
    }
    result
}

async fn run(
    config: &AppConfig,
    bus: &Arc<EventBus>,
    collaborators: &Collaborators,
    shutdown: CancellationToken,
) -> Result<()> {
    let publisher: Arc<dyn EventPublisher> = bus.clone();
    let context = HandlerContext {
        units: Arc::new(InMemoryStore::new()),
        publisher: Arc::clone(&publisher),
        provider: collaborators.provider.clone(),
        notifier: Arc::clone(&collaborators.notifier),
    };
    subscribe_all(bus, HANDLERS, &context).await?;

    let scheduler = UpdateScheduler::new(Arc::clone(&publisher), config.update_interval())
        .spawn(shutdown.child_token());

    let served = serve_http(config, publisher, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = scheduler.await {
        error!("Scheduler task failed: {}", e);
    }
    served
}

async fn serve_http(
    config: &AppConfig,
    publisher: Arc<dyn EventPublisher>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(AppState::new(publisher)))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")
}

async fn close_bus(bus: &EventBus) {
    if let Err(e) = bus.close().await {
        error!("Error closing event bus: {}", e);
    }
}

/// Publish one update event and return its id
///
/// # Errors
/// Bus connection or publish failures.
pub async fn trigger(config: &AppConfig, filters: Vec<String>) -> Result<String> {
    let bus = event_bus(config);
    if let Err(e) = bus.open().await {
        close_bus(&bus).await;
        return Err(e).context("Failed to open event bus");
    }

    let event = Event::new(UpdateFinancialInstruments {
        filters: (!filters.is_empty()).then_some(filters),
    });
    let published = bus
        .publish(&event)
        .await
        .context("Failed to publish update event");

    close_bus(&bus).await;
    published.map(|()| event.event_id().to_string())
}
