//! Persistence ports for financial instrument data
//!
//! The ingest service only talks to [`UnitOfWorkFactory`], [`UnitOfWork`] and
//! [`InstrumentRepository`]. [`InMemoryStore`] is the bundled adapter.

pub mod error;
pub mod memory;
pub mod repository;

pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use repository::{InstrumentRepository, UnitOfWork, UnitOfWorkFactory};
