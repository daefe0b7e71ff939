//! Components shared between providers

pub mod adapter;

pub use adapter::{FeedError, MarketDataProvider};
