//! Market Connector Service
//!
//! Keeps financial instrument data current. Update requests arrive as
//! `UpdateFinancialInstruments` events, from the periodic scheduler, the HTTP
//! trigger or the CLI, and are handled exactly once per event id. Completion
//! is announced with a `Notification` event.

pub mod api;
pub mod app;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod notifications;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use api::{AppState, TriggerResponse, router};
pub use config::{AppConfig, ConfigError, TelegramConfig};
pub use handlers::{NotificationHandler, UpdateFinancialInstrumentsHandler};
pub use notifications::{LogNotifier, NotificationError, NotificationSender, TelegramNotifier};
pub use registry::{HANDLERS, HandlerContext, HandlerEntry, build_handler, subscribe_all};
pub use scheduler::UpdateScheduler;
pub use service::{InstrumentUpdateService, UPDATE_COMPLETE_TEXT};
