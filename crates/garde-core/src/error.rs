//! Error types for `garde-core`.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("latitude must be between -90 and 90, got {0}")]
  InvalidLatitude(f64),

  #[error("longitude must be between -180 and 180, got {0}")]
  InvalidLongitude(f64),

  #[error("radius must be a non-negative number of metres, got {0}")]
  InvalidRadius(f64),

  #[error("invalid date {0:?}: expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("limit must be at least 1")]
  InvalidLimit,

  /// The backing store could not be reached or was busy. Nothing is
  /// retried internally; the same call may succeed later.
  #[error("store unavailable: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The store answered but its data could not be used (a row that does
  /// not decode, a constraint the schema should have enforced). Retrying
  /// will fail the same way.
  #[error("store data error: {0}")]
  Corrupt(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error, classified by [`StoreError::is_transient`].
  pub fn store<E: StoreError>(err: E) -> Self {
    if err.is_transient() {
      Self::Store(Box::new(err))
    } else {
      Self::Corrupt(Box::new(err))
    }
  }

  /// Bad caller input; retrying the same request cannot succeed.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::InvalidLatitude(_)
        | Self::InvalidLongitude(_)
        | Self::InvalidRadius(_)
        | Self::InvalidDate(_)
        | Self::InvalidLimit
    )
  }

  /// Store-side outage; the same request may succeed later.
  pub fn is_transient(&self) -> bool { matches!(self, Self::Store(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
