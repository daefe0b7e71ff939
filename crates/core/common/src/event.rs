//! Domain events carried over the message bus
//!
//! An [`Event`] wraps a typed payload with the identity fields every event
//! shares. On the wire all fields sit side by side in one JSON object:
//!
//! ```json
//! {"event_id":"...","event_type":"Notification","occurred_on":"...","text":"X"}
//! ```

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::QUEUE_SUFFIX;

/// A payload that can travel over the bus.
///
/// `EVENT_TYPE` doubles as the routing key and the queue name stem.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Event type name
    const EVENT_TYPE: &'static str;
}

/// Immutable event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    event_id: String,
    event_type: String,
    occurred_on: String,
    #[serde(flatten)]
    payload: P,
}

impl<P: DomainEvent> Event<P> {
    /// Create an event with a fresh id and the current UTC time
    pub fn new(payload: P) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), payload)
    }

    /// Create an event carrying an existing id (re-publishing the same occurrence)
    pub fn with_id(event_id: impl Into<String>, payload: P) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: P::EVENT_TYPE.to_string(),
            occurred_on: Utc::now().to_rfc3339(),
            payload,
        }
    }

    /// Decode an event from a parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Serialize into the wire representation
    pub fn encode(&self) -> Result<EncodedEvent, serde_json::Error> {
        Ok(EncodedEvent {
            event_id: self.event_id.clone(),
            event_type: self.event_type.clone(),
            body: serde_json::to_vec(self)?,
        })
    }
}

impl<P> Event<P> {
    /// Unique identifier, the sole idempotency key
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Event type name
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// UTC timestamp of construction
    pub fn occurred_on(&self) -> &str {
        &self.occurred_on
    }

    /// Event specific fields
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

/// Serialized event ready for the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    /// Event id
    pub event_id: String,
    /// Event type, used as the routing key
    pub event_type: String,
    /// JSON body
    pub body: Vec<u8>,
}

/// Durable queue name for an event type
pub fn queue_name(event_type: &str) -> String {
    format!("{event_type}{QUEUE_SUFFIX}")
}

/// Request to refresh exchanges, tickers and end-of-day data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFinancialInstruments {
    /// Restrict the update to these exchange codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<String>>,
}

impl DomainEvent for UpdateFinancialInstruments {
    const EVENT_TYPE: &'static str = "UpdateFinancialInstruments";
}

/// Free text notification for operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Message text
    pub text: String,
}

impl Notification {
    /// Create a notification
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl DomainEvent for Notification {
    const EVENT_TYPE: &'static str = "Notification";
}
