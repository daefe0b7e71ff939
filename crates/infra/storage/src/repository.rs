//! Repository and unit-of-work ports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Exchange, HistoricalData, TechnicalData, Ticker};

use crate::error::StorageResult;

/// Access to the financial instrument aggregate
#[async_trait]
pub trait InstrumentRepository: Send + Sync {
    async fn get_exchange(&self, code: &str) -> StorageResult<Option<Exchange>>;

    /// Look up a ticker by provider symbol (`CODE.EXCHANGE`)
    async fn get_ticker(&self, symbol: &str) -> StorageResult<Option<Ticker>>;

    async fn get_historical_data(
        &self,
        code: &str,
        date: DateTime<Utc>,
    ) -> StorageResult<Option<HistoricalData>>;

    async fn get_technical_data(&self, code: &str) -> StorageResult<Option<TechnicalData>>;

    /// Fails with `Duplicate` if the code is taken
    async fn add_exchange(&mut self, exchange: Exchange) -> StorageResult<()>;

    /// Fails with `Duplicate` if the symbol is taken
    async fn add_ticker(&mut self, ticker: Ticker) -> StorageResult<()>;

    /// Overwrites an existing bar for the same code and date
    async fn add_historical_data(&mut self, data: HistoricalData) -> StorageResult<()>;

    async fn add_historical_data_bulk(&mut self, data: Vec<HistoricalData>) -> StorageResult<()>;

    /// Fails with `Duplicate` if technicals for the code exist
    async fn add_technical_data(&mut self, data: TechnicalData) -> StorageResult<()>;

    /// Fails with `NotFound` if no technicals for the code exist
    async fn update_technical_data(&mut self, data: TechnicalData) -> StorageResult<()>;
}

/// A transactional scope over the repository.
///
/// Writes become visible to other scopes on [`commit`](UnitOfWork::commit).
/// Anything not committed when the scope is dropped is discarded.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn instruments(&mut self) -> &mut dyn InstrumentRepository;

    async fn commit(&mut self) -> StorageResult<()>;

    async fn rollback(&mut self) -> StorageResult<()>;
}

/// Opens unit-of-work scopes
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> StorageResult<Box<dyn UnitOfWork>>;
}
