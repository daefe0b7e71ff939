//! Common types shared across the ingest workspace
//!
//! - `event`: domain event envelope and payloads carried over the bus
//! - `instrument`: exchange, ticker, historical and technical records
//! - `constants`: broker, idempotency and HTTP defaults

pub mod constants;
pub mod event;
pub mod instrument;

pub use event::{DomainEvent, EncodedEvent, Event, Notification, UpdateFinancialInstruments, queue_name};
pub use instrument::{
    EndOfDayRecord, Exchange, HistoricalData, InstrumentError, TechnicalData, Ticker,
    format_historical_data, split_end_of_day, symbol,
};
