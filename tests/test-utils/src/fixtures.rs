//! EODHD response fixtures

use common::{EndOfDayRecord, Exchange, Ticker};
use rstest::*;
use serde_json::{Value, json};

use crate::mocks::FakeProvider;

/// `exchanges-list/` response
pub fn exchanges_json() -> Value {
    json!([
        {
            "Name": "USA Stocks",
            "Code": "US",
            "OperatingMIC": "XNAS, XNYS",
            "Country": "USA",
            "Currency": "USD",
            "CountryISO2": "US",
            "CountryISO3": "USA"
        },
        {
            "Name": "London Exchange",
            "Code": "LSE",
            "OperatingMIC": "XLON",
            "Country": "UK",
            "Currency": "GBP",
            "CountryISO2": "GB",
            "CountryISO3": "GBR"
        }
    ])
}

/// `exchange-symbol-list/US` response
pub fn tickers_json() -> Value {
    json!([
        {
            "Code": "AAPL",
            "Name": "Apple Inc",
            "Country": "USA",
            "Exchange": "NASDAQ",
            "Currency": "USD",
            "Type": "Common Stock",
            "Isin": "US0378331005"
        },
        {
            "Code": "MSFT",
            "Name": "Microsoft Corporation",
            "Country": "USA",
            "Exchange": "NASDAQ",
            "Currency": "USD",
            "Type": "Common Stock",
            "Isin": "US5949181045"
        }
    ])
}

/// `exchange-symbol-list/US?delisted=1` response
pub fn delisted_tickers_json() -> Value {
    json!([
        {
            "Code": "LEH",
            "Name": "Lehman Brothers Holdings Inc",
            "Country": "USA",
            "Exchange": "NYSE",
            "Currency": "USD",
            "Type": "Common Stock",
            "Isin": null
        }
    ])
}

/// `eod/{symbol}` response
pub fn historical_json() -> Value {
    json!([
        {"date": "2025-01-02", "open": 248.93, "high": 249.10, "low": 241.82, "close": 243.85, "adjusted_close": 243.26, "volume": 55740700},
        {"date": "2025-01-03", "open": 243.36, "high": 244.18, "low": 241.89, "close": 243.36, "adjusted_close": 242.77, "volume": 40244100}
    ])
}

/// `eod-bulk-last-day/US?filter=extended` response
pub fn bulk_eod_json() -> Value {
    json!([
        {
            "code": "AAPL", "exchange_short_name": "US", "date": "2025-01-06",
            "open": 244.31, "high": 247.33, "low": 243.20, "close": 245.00,
            "adjusted_close": 244.41, "volume": 45045600,
            "prev_close": 243.36, "change": 1.64, "change_p": 0.6739,
            "MarketCapitalization": 3703654000000.0, "Beta": 1.24,
            "ema_50d": 235.12, "ema_200d": 214.70, "hi_250d": 260.10, "lo_250d": 164.08,
            "avgvol_14d": 41000000, "avgvol_50d": 45000000, "avgvol_200d": 55000000
        },
        {
            "code": "MSFT", "exchange_short_name": "US", "date": "2025-01-06",
            "open": 428.00, "high": 434.95, "low": 425.36, "close": 427.85,
            "adjusted_close": 426.12, "volume": 20573600,
            "prev_close": 423.35, "change": 4.50, "change_p": 1.0630,
            "MarketCapitalization": 3180000000000.0, "Beta": 0.90,
            "ema_50d": 429.80, "ema_200d": 424.10, "hi_250d": 468.35, "lo_250d": 385.58,
            "avgvol_14d": 19000000, "avgvol_50d": 20000000, "avgvol_200d": 21000000
        }
    ])
}

#[fixture]
pub fn exchanges() -> Vec<Exchange> {
    serde_json::from_value(exchanges_json()).expect("exchange fixture must deserialize")
}

#[fixture]
pub fn us_tickers() -> Vec<Ticker> {
    serde_json::from_value(tickers_json()).expect("ticker fixture must deserialize")
}

#[fixture]
pub fn bulk_rows() -> Vec<EndOfDayRecord> {
    serde_json::from_value(bulk_eod_json()).expect("bulk fixture must deserialize")
}

/// Provider covering the US exchange: two listed tickers, one delisted,
/// history for each and a bulk snapshot
#[fixture]
pub fn us_provider() -> FakeProvider {
    let [us, _]: [Exchange; 2] =
        serde_json::from_value(exchanges_json()).expect("exchange fixture must deserialize");
    let history: Vec<EndOfDayRecord> =
        serde_json::from_value(historical_json()).expect("history fixture must deserialize");
    let delisted: Vec<Ticker> =
        serde_json::from_value(delisted_tickers_json()).expect("ticker fixture must deserialize");

    FakeProvider::new()
        .with_exchange(us)
        .with_tickers("US", false, us_tickers())
        .with_tickers("US", true, delisted)
        .with_historical("AAPL.US", history.clone())
        .with_historical("MSFT.US", history.clone())
        .with_historical("LEH.US", history)
        .with_bulk("US", bulk_rows())
}
