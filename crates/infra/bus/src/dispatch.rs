//! Per-message delivery state machine
//!
//! ```text
//! received -> parsed | rejected(poison)
//! parsed   -> has_id | rejected(no id)
//! has_id   -> duplicate (ack, handler skipped) | novel
//! novel    -> handled (mark processed, ack) | failed (reject + requeue)
//! ```

use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::BusResult;
use crate::handler::EventHandler;
use crate::idempotency::IdempotencyStore;

/// Where a message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handler succeeded and the event was marked processed
    Handled,
    /// Event id already processed; handler not invoked
    Duplicate,
    /// Body was not valid JSON
    Poison,
    /// Body had no usable `event_id`
    MissingId,
    /// Handler returned an error
    HandlerFailed,
}

/// How the broker should settle a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Reject { requeue: bool },
}

impl Outcome {
    pub const fn disposition(self) -> Disposition {
        match self {
            Self::Handled | Self::Duplicate => Disposition::Ack,
            Self::Poison | Self::MissingId => Disposition::Reject { requeue: false },
            Self::HandlerFailed => Disposition::Reject { requeue: true },
        }
    }
}

/// Run one message body through parse, dedupe, handle and mark.
///
/// # Errors
/// Idempotency store failures are returned as-is; the caller decides how to
/// settle a message whose processed state is unknown.
pub async fn process_message(
    body: &[u8],
    store: &dyn IdempotencyStore,
    handler: &dyn EventHandler,
) -> BusResult<Outcome> {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(handler = handler.name(), "Rejecting unparseable message: {}", e);
            return Ok(Outcome::Poison);
        }
    };

    let Some(event_id) = payload
        .get("event_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
    else {
        error!(handler = handler.name(), "Rejecting message without event_id");
        return Ok(Outcome::MissingId);
    };

    if store.is_processed(&event_id).await? {
        info!(event_id = %event_id, handler = handler.name(), "Skipping already processed event");
        return Ok(Outcome::Duplicate);
    }

    if let Err(e) = handler.handle(payload).await {
        warn!(
            event_id = %event_id,
            handler = handler.name(),
            "Handler failed, message will be redelivered: {:#}",
            e
        );
        return Ok(Outcome::HandlerFailed);
    }

    store.mark_as_processed(&event_id).await?;
    info!(event_id = %event_id, handler = handler.name(), "Processed event");
    Ok(Outcome::Handled)
}
