//! Mock components for testing

use async_trait::async_trait;
use bus::{BusError, BusResult, EventHandler, EventPublisher, IdempotencyStore, InMemoryIdempotencyStore};
use common::{EncodedEvent, EndOfDayRecord, Exchange, Ticker};
use feeds::{FeedError, HttpError, HttpRequest, HttpTransport, MarketDataProvider, TransportErrorKind};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// HTTP transport that replays a fixed script of responses.
///
/// Each call pops the next entry. Once the script is exhausted every call
/// fails with a connection error, so an empty script models a dead server.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Value, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful JSON response
    pub fn then_ok(mut self, body: Value) -> Self {
        self.script.get_mut().push_back(Ok(body));
        self
    }

    /// Queue a connection-refused failure
    pub fn then_transport_error(mut self) -> Self {
        self.script.get_mut().push_back(Err(HttpError::transport(
            TransportErrorKind::Connect,
            "http://scripted",
            "connection refused",
        )));
        self
    }

    /// Queue a non-2xx response
    pub fn then_status(mut self, status: u16) -> Self {
        self.script.get_mut().push_back(Err(HttpError::Status {
            status,
            url: "http://scripted".to_string(),
        }));
        self
    }

    /// Number of attempts made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in order
    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<Value, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        self.script.lock().await.pop_front().unwrap_or_else(|| {
            Err(HttpError::transport(
                TransportErrorKind::Connect,
                request.url.clone(),
                "connection refused",
            ))
        })
    }
}

/// Event handler that records every payload it receives.
///
/// A handler built with [`RecordingHandler::failing`] returns an error for
/// its first `n` invocations and succeeds afterwards.
#[derive(Debug)]
pub struct RecordingHandler {
    event_type: String,
    payloads: Mutex<Vec<Value>>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl RecordingHandler {
    pub fn new(event_type: &str) -> Self {
        Self::failing(event_type, 0)
    }

    pub fn failing(event_type: &str, failures: usize) -> Self {
        Self {
            event_type: event_type.to_string(),
            payloads: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        }
    }

    /// Invocations, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payloads of successful invocations
    pub async fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().await.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn handle(&self, payload: Value) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("scripted handler failure");
        }
        self.payloads.lock().await.push(payload);
        Ok(())
    }
}

/// Which idempotency operation should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    Initialize,
    Read,
    Write,
}

/// Idempotency store whose chosen operation fails with a Redis I/O error
#[derive(Debug)]
pub struct FailingIdempotencyStore {
    failure: StoreFailure,
    inner: InMemoryIdempotencyStore,
}

impl FailingIdempotencyStore {
    pub fn new(failure: StoreFailure) -> Self {
        Self {
            failure,
            inner: InMemoryIdempotencyStore::new(),
        }
    }

    fn fail(&self, operation: StoreFailure) -> BusResult<()> {
        if self.failure == operation {
            return Err(BusError::Store(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for FailingIdempotencyStore {
    async fn initialize(&self) -> BusResult<()> {
        self.fail(StoreFailure::Initialize)?;
        self.inner.initialize().await
    }

    async fn is_processed(&self, event_id: &str) -> BusResult<bool> {
        self.fail(StoreFailure::Read)?;
        self.inner.is_processed(event_id).await
    }

    async fn mark_as_processed(&self, event_id: &str) -> BusResult<()> {
        self.fail(StoreFailure::Write)?;
        self.inner.mark_as_processed(event_id).await
    }
}

/// Publisher that keeps every encoded event
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<EncodedEvent>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail with a broker error
    pub fn fail_publishes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<EncodedEvent> {
        self.events.lock().await.clone()
    }

    /// Published bodies decoded as JSON
    pub async fn payloads(&self) -> Vec<Value> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| serde_json::from_slice(&event.body).ok())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_encoded(&self, event: EncodedEvent) -> BusResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BusError::Broker("publish refused".to_string()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Market data provider serving canned responses
#[derive(Debug, Default)]
pub struct FakeProvider {
    exchanges: Vec<Exchange>,
    tickers: HashMap<(String, bool), Vec<Ticker>>,
    historical: HashMap<String, Vec<EndOfDayRecord>>,
    bulk: HashMap<String, Vec<EndOfDayRecord>>,
    failing_bulk: Option<String>,
    exchange_calls: AtomicUsize,
    historical_calls: Mutex<Vec<String>>,
    bulk_calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchange(mut self, exchange: Exchange) -> Self {
        self.exchanges.push(exchange);
        self
    }

    pub fn with_tickers(mut self, exchange_code: &str, delisted: bool, tickers: Vec<Ticker>) -> Self {
        self.tickers.insert((exchange_code.to_string(), delisted), tickers);
        self
    }

    pub fn with_historical(mut self, symbol: &str, rows: Vec<EndOfDayRecord>) -> Self {
        self.historical.insert(symbol.to_string(), rows);
        self
    }

    pub fn with_bulk(mut self, exchange_code: &str, rows: Vec<EndOfDayRecord>) -> Self {
        self.bulk.insert(exchange_code.to_string(), rows);
        self
    }

    /// Bulk requests for `exchange_code` fail with HTTP 500
    pub fn with_failing_bulk(mut self, exchange_code: &str) -> Self {
        self.failing_bulk = Some(exchange_code.to_string());
        self
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    /// Symbols whose history was requested, in call order
    pub async fn historical_calls(&self) -> Vec<String> {
        self.historical_calls.lock().await.clone()
    }

    /// Exchanges whose bulk snapshot was requested
    pub async fn bulk_calls(&self) -> Vec<String> {
        self.bulk_calls.lock().await.clone()
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn get_exchanges(&self) -> Result<Vec<Exchange>, FeedError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.exchanges.clone())
    }

    async fn get_tickers(&self, exchange_code: &str, delisted: bool) -> Result<Vec<Ticker>, FeedError> {
        let mut tickers = self
            .tickers
            .get(&(exchange_code.to_string(), delisted))
            .cloned()
            .unwrap_or_default();
        for ticker in &mut tickers {
            ticker.exchange_code = exchange_code.to_string();
            ticker.delisted = delisted;
        }
        Ok(tickers)
    }

    async fn get_historical_data(&self, symbol: &str) -> Result<Vec<EndOfDayRecord>, FeedError> {
        self.historical_calls.lock().await.push(symbol.to_string());
        Ok(self.historical.get(symbol).cloned().unwrap_or_default())
    }

    async fn get_eod_bulk_data(&self, exchange_code: &str) -> Result<Vec<EndOfDayRecord>, FeedError> {
        self.bulk_calls.lock().await.push(exchange_code.to_string());
        if self.failing_bulk.as_deref() == Some(exchange_code) {
            return Err(FeedError::Http(HttpError::Status {
                status: 500,
                url: format!("http://fake/eod-bulk-last-day/{exchange_code}"),
            }));
        }
        Ok(self.bulk.get(exchange_code).cloned().unwrap_or_default())
    }
}
