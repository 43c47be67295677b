//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::QueryRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  /// The store could not answer. Nothing was partially served; the caller
  /// may retry.
  #[error("store unavailable: {0}")]
  Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The store answered with data that cannot be used. Retrying will not
  /// help.
  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<garde_core::Error> for ApiError {
  fn from(err: garde_core::Error) -> Self {
    match err {
      garde_core::Error::Store(source) => ApiError::Unavailable(source),
      garde_core::Error::Corrupt(source) => ApiError::Internal(source),
      other => ApiError::BadRequest(other.to_string()),
    }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unavailable(e) => {
        tracing::error!(error = %e, "store error while serving request");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
      }
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "unusable store data while serving request");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn status_of(err: garde_core::Error) -> StatusCode {
    ApiError::from(err).into_response().status()
  }

  #[test]
  fn core_errors_map_to_status_codes() {
    assert_eq!(status_of(garde_core::Error::InvalidLatitude(91.0)), StatusCode::BAD_REQUEST);
    assert_eq!(
      status_of(garde_core::Error::Store("database is locked".into())),
      StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
      status_of(garde_core::Error::Corrupt("bad created_at".into())),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
