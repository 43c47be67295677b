//! Error type for `garde-store-sqlite`.

use garde_core::{pharmacy::PharmacyId, store::StoreError};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] garde_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid stored value: {0}")]
  Decode(String),

  /// Table prefixes are spliced into SQL, so only `[A-Za-z0-9_]` is allowed.
  #[error("invalid table prefix {0:?}")]
  InvalidTablePrefix(String),

  #[error("pharmacy not found: {0}")]
  PharmacyNotFound(PharmacyId),
}

impl StoreError for Error {
  /// Only a lost connection or a busy/locked database clears up on its own.
  /// Undecodable rows, broken references and constraint violations repeat.
  fn is_transient(&self) -> bool {
    match self {
      Self::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
      Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) => {
        matches!(
          e.code,
          ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
        )
      }
      Self::Core(e) => e.is_transient(),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
