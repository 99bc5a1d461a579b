//! SQLite backend for the Matric cleaned and core layers.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. One database file holds both
//! layers plus the sync-run audit log; [`SqliteStore`] implements
//! `CleanedStore` and `CoreStore`.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
