//! Financial instrument records
//!
//! Field aliases accept the capitalised keys used by the EODHD listing
//! endpoints so listings deserialize straight into the stored models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Date layout used by end-of-day rows
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Instrument formatting errors
#[derive(Error, Debug)]
pub enum InstrumentError {
    /// Date did not match `%Y-%m-%d`
    #[error("invalid date {value:?}: {source}")]
    InvalidDate {
        /// Raw value
        value: String,
        /// Parse failure
        source: chrono::ParseError,
    },

    /// A row lacked a field required to key it
    #[error("end-of-day row is missing {0}")]
    MissingField(&'static str),
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Exchange listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Exchange code, e.g. `US`
    #[serde(alias = "Code")]
    pub code: String,
    /// Display name
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Country", default)]
    pub country: Option<String>,
    #[serde(alias = "Currency", default)]
    pub currency: Option<String>,
    /// Market identifier codes, comma separated
    #[serde(alias = "OperatingMIC", default)]
    pub operating_mic: Option<String>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub modified_at: DateTime<Utc>,
}

/// Ticker listed on an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Ticker code without exchange suffix, e.g. `AAPL`
    #[serde(alias = "Code")]
    pub code: String,
    #[serde(alias = "Name", default)]
    pub name: Option<String>,
    /// Exchange the listing was requested for
    #[serde(default)]
    pub exchange_code: String,
    /// Venue reported by the provider, e.g. `NASDAQ`
    #[serde(alias = "Exchange", default)]
    pub venue: Option<String>,
    #[serde(alias = "Country", default)]
    pub country: Option<String>,
    #[serde(alias = "Currency", default)]
    pub currency: Option<String>,
    #[serde(alias = "Type", default)]
    pub instrument_type: Option<String>,
    #[serde(alias = "Isin", default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub delisted: bool,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub modified_at: DateTime<Utc>,
}

impl Ticker {
    /// Provider symbol, `CODE.EXCHANGE`
    pub fn symbol(&self) -> String {
        symbol(&self.code, &self.exchange_code)
    }
}

/// Join a ticker code and exchange code into a provider symbol
pub fn symbol(code: &str, exchange_code: &str) -> String {
    if exchange_code.is_empty() {
        code.to_string()
    } else {
        format!("{code}.{exchange_code}")
    }
}

/// One end-of-day bar for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalData {
    /// Provider symbol
    pub code: String,
    pub date: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
    pub volume: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Latest technical indicators for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalData {
    /// Provider symbol
    pub code: String,
    pub market_capitalization: Option<f64>,
    pub beta: Option<f64>,
    pub ema_50d: Option<f64>,
    pub ema_200d: Option<f64>,
    pub hi_250d: Option<f64>,
    pub lo_250d: Option<f64>,
    pub prev_close: Option<f64>,
    pub change: Option<f64>,
    pub change_p: Option<f64>,
    pub avgvol_14d: Option<f64>,
    pub avgvol_50d: Option<f64>,
    pub avgvol_200d: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Raw end-of-day row as returned by the historical and bulk endpoints.
///
/// Historical rows carry no code; bulk rows carry the code plus the
/// extended technical columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndOfDayRecord {
    #[serde(default)]
    pub code: Option<String>,
    pub date: String,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub adjusted_close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(rename = "MarketCapitalization", default)]
    pub market_capitalization: Option<f64>,
    #[serde(rename = "Beta", default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub ema_50d: Option<f64>,
    #[serde(default)]
    pub ema_200d: Option<f64>,
    #[serde(default)]
    pub hi_250d: Option<f64>,
    #[serde(alias = "low_250d", default)]
    pub lo_250d: Option<f64>,
    #[serde(default)]
    pub prev_close: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_p: Option<f64>,
    #[serde(default)]
    pub avgvol_14d: Option<f64>,
    #[serde(default)]
    pub avgvol_50d: Option<f64>,
    #[serde(default)]
    pub avgvol_200d: Option<f64>,
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, InstrumentError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|source| InstrumentError::InvalidDate {
            value: value.to_string(),
            source,
        })
}

/// Build a historical bar for `code` from a raw row, date at UTC midnight
pub fn format_historical_data(
    code: &str,
    record: &EndOfDayRecord,
) -> Result<HistoricalData, InstrumentError> {
    let timestamp = Utc::now();
    Ok(HistoricalData {
        code: code.to_string(),
        date: parse_date(&record.date)?,
        open: record.open,
        high: record.high,
        low: record.low,
        close: record.close,
        adjusted_close: record.adjusted_close,
        volume: record.volume,
        created_at: timestamp,
        modified_at: timestamp,
    })
}

/// Split a bulk row from `exchange_code` into its historical and technical parts
pub fn split_end_of_day(
    exchange_code: &str,
    record: &EndOfDayRecord,
) -> Result<(HistoricalData, TechnicalData), InstrumentError> {
    let code = record
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or(InstrumentError::MissingField("code"))?;
    let code = symbol(code, exchange_code);

    let historical = format_historical_data(&code, record)?;
    let technical = TechnicalData {
        code,
        market_capitalization: record.market_capitalization,
        beta: record.beta,
        ema_50d: record.ema_50d,
        ema_200d: record.ema_200d,
        hi_250d: record.hi_250d,
        lo_250d: record.lo_250d,
        prev_close: record.prev_close,
        change: record.change,
        change_p: record.change_p,
        avgvol_14d: record.avgvol_14d,
        avgvol_50d: record.avgvol_50d,
        avgvol_200d: record.avgvol_200d,
        created_at: historical.created_at,
        modified_at: historical.modified_at,
    };

    Ok((historical, technical))
}
