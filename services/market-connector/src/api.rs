//! HTTP trigger surface

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use bus::{EventPublisher, EventPublisherExt};
use common::{Event, UpdateFinancialInstruments};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    publisher: Arc<dyn EventPublisher>,
}

impl AppState {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

/// Optional query of the trigger endpoint
#[derive(Debug, Default, Deserialize)]
pub struct TriggerParams {
    /// Comma separated exchange codes
    pub filters: Option<String>,
}

impl TriggerParams {
    fn exchange_codes(&self) -> Option<Vec<String>> {
        let codes: Vec<String> = self
            .filters
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();
        (!codes.is_empty()).then_some(codes)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub event_id: String,
}

/// Error returned when the event could not be published
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        let body = Json(json!({ "error": format!("{:#}", self.0) }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

/// Routes: `GET /update_financial_instruments`, `GET /health`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/update_financial_instruments", get(update_financial_instruments))
        .route("/health", get(health))
        .with_state(state)
}

async fn update_financial_instruments(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    let event = Event::new(UpdateFinancialInstruments {
        filters: params.exchange_codes(),
    });
    state.publisher.publish_event(&event).await?;

    info!(event_id = event.event_id(), "Instrument update requested over HTTP");
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            event_id: event.event_id().to_string(),
        }),
    ))
}

async fn health() -> &'static str {
    "ok"
}
