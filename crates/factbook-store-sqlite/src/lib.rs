//! SQLite backend for the Factbook contact repository.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod settings;

pub use error::{Error, Result};
pub use settings::{JournalMode, StoreConfig};
pub use store::SqliteStore;

/// A [`Repository`](factbook_core::repository::Repository) persisted in
/// SQLite.
pub type SqliteRepository = factbook_core::repository::Repository<SqliteStore>;
