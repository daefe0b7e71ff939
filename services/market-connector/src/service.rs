//! Financial instrument update workflow
//!
//! One run walks the selected exchanges twice: first their listings (new
//! tickers are stored with their full history), then the last trading day
//! snapshot (one historical bar plus technicals per ticker). Work within each
//! phase runs concurrently; the first failure aborts the run.

use anyhow::{Context, Result};
use bus::{EventPublisher, EventPublisherExt};
use common::{
    EndOfDayRecord, Event, Exchange, Notification, Ticker, format_historical_data, split_end_of_day,
};
use feeds::MarketDataProvider;
use futures::future::try_join_all;
use std::sync::Arc;
use storage::UnitOfWorkFactory;
use tracing::{debug, error, info};

/// Text of the notification published after a successful run
pub const UPDATE_COMPLETE_TEXT: &str = "Fetched new data for financial instruments.";

/// Pulls provider data into the repository and announces completion
pub struct InstrumentUpdateService {
    units: Arc<dyn UnitOfWorkFactory>,
    publisher: Arc<dyn EventPublisher>,
    provider: Arc<dyn MarketDataProvider>,
}

impl InstrumentUpdateService {
    pub fn new(
        units: Arc<dyn UnitOfWorkFactory>,
        publisher: Arc<dyn EventPublisher>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            units,
            publisher,
            provider,
        }
    }

    /// Update the exchanges named in `filters`, or every exchange the
    /// provider lists when no filter is given.
    ///
    /// # Errors
    /// Any provider, storage or publish failure; nothing is published then.
    pub async fn update_financial_instruments(&self, filters: Option<&[String]>) -> Result<()> {
        let exchange_codes = match filters {
            Some(codes) if !codes.is_empty() => codes.to_vec(),
            _ => self.scan_exchanges().await?,
        };
        info!(exchanges = exchange_codes.len(), "Updating financial instruments");

        let result = async {
            try_join_all(exchange_codes.iter().map(|code| self.scan_tickers(code))).await?;
            try_join_all(exchange_codes.iter().map(|code| self.scan_end_of_day_data(code))).await?;

            let event = Event::new(Notification::new(UPDATE_COMPLETE_TEXT));
            self.publisher
                .publish_event(&event)
                .await
                .context("Failed to publish update notification")
        }
        .await;

        if let Err(e) = &result {
            error!("Error updating financial instruments: {:#}", e);
        }
        result
    }

    /// Store exchanges not seen before and return every listed code
    pub async fn scan_exchanges(&self) -> Result<Vec<String>> {
        debug!("Requesting list of available exchanges");
        let exchanges = self
            .provider
            .get_exchanges()
            .await
            .context("Failed to fetch exchanges")?;

        let codes = exchanges.iter().map(|exchange| exchange.code.clone()).collect();
        try_join_all(exchanges.into_iter().map(|exchange| self.store_exchange(exchange))).await?;
        Ok(codes)
    }

    async fn store_exchange(&self, exchange: Exchange) -> Result<()> {
        let code = exchange.code.clone();
        let mut uow = self.units.begin().await?;
        if uow.instruments().get_exchange(&code).await?.is_none() {
            uow.instruments().add_exchange(exchange).await?;
            uow.commit().await?;
            debug!(exchange = %code, "Added exchange");
        }
        Ok(())
    }

    /// Store every unseen current or delisted ticker of `exchange_code` together with its history
    pub async fn scan_tickers(&self, exchange_code: &str) -> Result<()> {
        debug!(exchange = exchange_code, "Scanning for new tickers");
        let mut tickers = self
            .provider
            .get_tickers(exchange_code, false)
            .await
            .with_context(|| format!("Failed to fetch tickers for {exchange_code}"))?;
        let delisted = self
            .provider
            .get_tickers(exchange_code, true)
            .await
            .with_context(|| format!("Failed to fetch delisted tickers for {exchange_code}"))?;
        tickers.extend(delisted);

        try_join_all(tickers.into_iter().map(|ticker| self.store_ticker(ticker)))
            .await
            .with_context(|| format!("Error scanning tickers for exchange {exchange_code}"))?;
        Ok(())
    }

    async fn store_ticker(&self, ticker: Ticker) -> Result<()> {
        let symbol = ticker.symbol();
        let mut uow = self.units.begin().await?;
        if uow.instruments().get_ticker(&symbol).await?.is_some() {
            return Ok(());
        }

        let history = self
            .provider
            .get_historical_data(&symbol)
            .await
            .with_context(|| format!("Failed to fetch history for {symbol}"))?;
        let bars = history
            .iter()
            .map(|record| format_historical_data(&symbol, record))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid history for {symbol}"))?;
        let bar_count = bars.len();

        uow.instruments().add_ticker(ticker).await?;
        uow.commit().await?;
        uow.instruments().add_historical_data_bulk(bars).await?;
        uow.commit().await?;

        debug!(symbol = %symbol, bars = bar_count, "Added financial instrument");
        Ok(())
    }

    /// Apply the last trading day snapshot of `exchange_code`
    pub async fn scan_end_of_day_data(&self, exchange_code: &str) -> Result<()> {
        debug!(exchange = exchange_code, "Scanning end-of-day data");
        let records = self
            .provider
            .get_eod_bulk_data(exchange_code)
            .await
            .with_context(|| format!("Failed to fetch end-of-day data for {exchange_code}"))?;

        try_join_all(
            records
                .iter()
                .map(|record| self.store_end_of_day(exchange_code, record)),
        )
        .await
        .with_context(|| format!("Error updating end-of-day data for exchange {exchange_code}"))?;
        Ok(())
    }

    async fn store_end_of_day(&self, exchange_code: &str, record: &EndOfDayRecord) -> Result<()> {
        let (bar, technicals) = split_end_of_day(exchange_code, record)?;

        let mut uow = self.units.begin().await?;
        uow.instruments().add_historical_data(bar).await?;
        if uow
            .instruments()
            .get_technical_data(&technicals.code)
            .await?
            .is_some()
        {
            uow.instruments().update_technical_data(technicals).await?;
        } else {
            uow.instruments().add_technical_data(technicals).await?;
        }
        uow.commit().await?;
        Ok(())
    }
}
