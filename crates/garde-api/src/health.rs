//! Handler for `GET /health`.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use garde_core::{finder::DutyFinder, store::PharmacyStore};
use serde_json::json;

/// `{"api":"ok","database":"ok"}`, or 503 with the store error when the
/// store does not answer.
pub async fn handler<S>(State(finder): State<DutyFinder<S>>) -> Response
where
  S: PharmacyStore,
{
  match finder.health().await {
    Ok(()) => Json(json!({ "api": "ok", "database": "ok" })).into_response(),
    Err(e) => {
      tracing::warn!(error = %e, "health check failed");
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "api": "ok", "database": e.to_string() })),
      )
        .into_response()
    }
  }
}
