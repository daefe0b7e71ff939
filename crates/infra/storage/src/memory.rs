//! In-memory repository adapter
//!
//! Committed state lives behind a shared lock. Each unit of work stages its
//! writes privately, reads through its own staged rows first, and merges
//! them into the shared tables in one step on commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Exchange, HistoricalData, TechnicalData, Ticker};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::repository::{InstrumentRepository, UnitOfWork, UnitOfWorkFactory};

#[derive(Debug, Default)]
struct Tables {
    exchanges: FxHashMap<String, Exchange>,
    tickers: FxHashMap<String, Ticker>,
    historical: BTreeMap<(String, DateTime<Utc>), HistoricalData>,
    technical: FxHashMap<String, TechnicalData>,
}

impl Tables {
    fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
            && self.tickers.is_empty()
            && self.historical.is_empty()
            && self.technical.is_empty()
    }

    fn merge(&mut self, staged: Tables) {
        self.exchanges.extend(staged.exchanges);
        self.tickers.extend(staged.tickers);
        self.historical.extend(staged.historical);
        self.technical.extend(staged.technical);
    }
}

/// Shared in-memory store; clones share the same tables
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchange_count(&self) -> usize {
        self.tables.read().exchanges.len()
    }

    pub fn ticker_count(&self) -> usize {
        self.tables.read().tickers.len()
    }

    pub fn historical_count(&self) -> usize {
        self.tables.read().historical.len()
    }

    pub fn technical_count(&self) -> usize {
        self.tables.read().technical.len()
    }

    /// Committed ticker by symbol
    pub fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.tables.read().tickers.get(symbol).cloned()
    }

    /// Committed technicals by code
    pub fn technical(&self, code: &str) -> Option<TechnicalData> {
        self.tables.read().technical.get(code).cloned()
    }

    /// Committed bars for a code, oldest first
    pub fn historical(&self, code: &str) -> Vec<HistoricalData> {
        self.tables
            .read()
            .historical
            .values()
            .filter(|bar| bar.code == code)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    async fn begin(&self) -> StorageResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            committed: Arc::clone(&self.tables),
            staged: Tables::default(),
        }))
    }
}

/// Unit of work over an [`InMemoryStore`]
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    committed: Arc<RwLock<Tables>>,
    staged: Tables,
}

impl InMemoryUnitOfWork {
    fn has_technical(&self, code: &str) -> bool {
        self.staged.technical.contains_key(code) || self.committed.read().technical.contains_key(code)
    }
}

#[async_trait]
impl InstrumentRepository for InMemoryUnitOfWork {
    async fn get_exchange(&self, code: &str) -> StorageResult<Option<Exchange>> {
        if let Some(exchange) = self.staged.exchanges.get(code) {
            return Ok(Some(exchange.clone()));
        }
        Ok(self.committed.read().exchanges.get(code).cloned())
    }

    async fn get_ticker(&self, symbol: &str) -> StorageResult<Option<Ticker>> {
        if let Some(ticker) = self.staged.tickers.get(symbol) {
            return Ok(Some(ticker.clone()));
        }
        Ok(self.committed.read().tickers.get(symbol).cloned())
    }

    async fn get_historical_data(
        &self,
        code: &str,
        date: DateTime<Utc>,
    ) -> StorageResult<Option<HistoricalData>> {
        let key = (code.to_string(), date);
        if let Some(bar) = self.staged.historical.get(&key) {
            return Ok(Some(bar.clone()));
        }
        Ok(self.committed.read().historical.get(&key).cloned())
    }

    async fn get_technical_data(&self, code: &str) -> StorageResult<Option<TechnicalData>> {
        if let Some(technical) = self.staged.technical.get(code) {
            return Ok(Some(technical.clone()));
        }
        Ok(self.committed.read().technical.get(code).cloned())
    }

    async fn add_exchange(&mut self, exchange: Exchange) -> StorageResult<()> {
        if self.get_exchange(&exchange.code).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "exchange",
                key: exchange.code,
            });
        }
        self.staged.exchanges.insert(exchange.code.clone(), exchange);
        Ok(())
    }

    async fn add_ticker(&mut self, ticker: Ticker) -> StorageResult<()> {
        let symbol = ticker.symbol();
        if self.get_ticker(&symbol).await?.is_some() {
            return Err(StorageError::Duplicate {
                entity: "ticker",
                key: symbol,
            });
        }
        self.staged.tickers.insert(symbol, ticker);
        Ok(())
    }

    async fn add_historical_data(&mut self, data: HistoricalData) -> StorageResult<()> {
        self.staged
            .historical
            .insert((data.code.clone(), data.date), data);
        Ok(())
    }

    async fn add_historical_data_bulk(&mut self, data: Vec<HistoricalData>) -> StorageResult<()> {
        self.staged
            .historical
            .extend(data.into_iter().map(|bar| ((bar.code.clone(), bar.date), bar)));
        Ok(())
    }

    async fn add_technical_data(&mut self, data: TechnicalData) -> StorageResult<()> {
        if self.has_technical(&data.code) {
            return Err(StorageError::Duplicate {
                entity: "technical data",
                key: data.code,
            });
        }
        self.staged.technical.insert(data.code.clone(), data);
        Ok(())
    }

    async fn update_technical_data(&mut self, mut data: TechnicalData) -> StorageResult<()> {
        let Some(existing) = self.get_technical_data(&data.code).await? else {
            return Err(StorageError::NotFound {
                entity: "technical data",
                key: data.code,
            });
        };
        data.created_at = existing.created_at;
        data.modified_at = Utc::now();
        self.staged.technical.insert(data.code.clone(), data);
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn instruments(&mut self) -> &mut dyn InstrumentRepository {
        self
    }

    async fn commit(&mut self) -> StorageResult<()> {
        let staged = std::mem::take(&mut self.staged);
        self.committed.write().merge(staged);
        debug!("Committed unit of work");
        Ok(())
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        self.staged = Tables::default();
        debug!("Rolled back unit of work");
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            debug!("Discarding uncommitted changes");
        }
    }
}
