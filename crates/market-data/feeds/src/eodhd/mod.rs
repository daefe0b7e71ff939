//! EODHD (eodhd.com) REST provider

pub mod client;
pub mod config;

pub use client::EodhdClient;
pub use config::EodhdConfig;
