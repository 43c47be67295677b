//! SQLite backend for the on-duty pharmacy store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Pharmacy locations are
//! indexed with SQLite's R*Tree module; radius queries read the index
//! instead of scanning the pharmacy table.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreConfig};
