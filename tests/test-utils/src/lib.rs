//! Test utilities shared by the workspace test suites
//!
//! - Logging setup and async polling helpers
//! - Scripted HTTP transport, recording handlers and publishers
//! - A canned market data provider and EODHD response fixtures

pub mod fixtures;
pub mod helpers;
pub mod mocks;

pub use fixtures::*;
pub use helpers::*;
pub use mocks::*;
