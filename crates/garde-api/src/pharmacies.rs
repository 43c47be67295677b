//! Handlers for `/pharmacies` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/pharmacies` | Optional `?city=&limit=` |
//! | `GET`  | `/pharmacies/nearby` | `?lat=&lon=[&radius=][&date=]`, on duty only; radius used in `x-search-radius-m` |
//! | `GET`  | `/pharmacies/search` | `?lat=&lon=[&radius=][&limit=]`, duty ignored |

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
  http::HeaderName,
  response::{IntoResponse, Response},
};
use garde_core::{
  finder::DutyFinder,
  query::{NearbyQuery, SearchQuery, parse_date},
  store::PharmacyStore,
};
use serde::Deserialize;

use crate::{error::ApiError, view::PharmacyRow};

/// Radius in metres the nearby search actually used, after clamping.
pub const SEARCH_RADIUS_HEADER: &str = "x-search-radius-m";

fn require_point(lat: Option<f64>, lon: Option<f64>) -> Result<(f64, f64), ApiError> {
  match (lat, lon) {
    (Some(lat), Some(lon)) => Ok((lat, lon)),
    _ => Err(ApiError::BadRequest("`lat` and `lon` are required".into())),
  }
}

// ─── Nearby ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct NearbyParams {
  pub lat:    Option<f64>,
  pub lon:    Option<f64>,
  /// Metres.
  pub radius: Option<f64>,
  /// `YYYY-MM-DD`; the server's local date when absent.
  pub date:   Option<String>,
}

/// `GET /pharmacies/nearby?lat=..&lon=..[&radius=..][&date=..]`
///
/// On-duty pharmacies within the radius, nearest first, followed by the
/// unmatched duty entries of the caller's inferred city. The radius applied
/// is echoed in [`SEARCH_RADIUS_HEADER`], since it may be smaller than the
/// one asked for.
pub async fn nearby<S>(
  State(finder): State<DutyFinder<S>>,
  params: Result<Query<NearbyParams>, QueryRejection>,
) -> Result<Response, ApiError>
where
  S: PharmacyStore,
{
  let Query(params) = params?;
  let (lat, lon) = require_point(params.lat, params.lon)?;
  let query = NearbyQuery {
    latitude:  lat,
    longitude: lon,
    radius_m:  params.radius,
    date:      params.date.as_deref().map(parse_date).transpose()?,
  };

  let report = finder.nearby_with_fallback(&query).await?;
  tracing::debug!(
    requested = ?params.radius,
    applied = report.radius_m,
    "nearby radius"
  );
  let radius = report.radius_m.to_string();
  let rows: Vec<PharmacyRow> = report
    .matched
    .into_iter()
    .map(PharmacyRow::from)
    .chain(report.unmatched.into_iter().map(PharmacyRow::from))
    .collect();
  Ok(
    (
      [(HeaderName::from_static(SEARCH_RADIUS_HEADER), radius)],
      Json(rows),
    )
      .into_response(),
  )
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  pub lat:    Option<f64>,
  pub lon:    Option<f64>,
  pub radius: Option<f64>,
  pub limit:  Option<usize>,
}

/// `GET /pharmacies/search?lat=..&lon=..[&radius=..][&limit=..]`
pub async fn search<S>(
  State(finder): State<DutyFinder<S>>,
  params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<PharmacyRow>>, ApiError>
where
  S: PharmacyStore,
{
  let Query(params) = params?;
  let (lat, lon) = require_point(params.lat, params.lon)?;
  let query = SearchQuery {
    latitude:  lat,
    longitude: lon,
    radius_m:  params.radius,
    limit:     params.limit,
  };

  let found = finder.search_nearby(&query).await?;
  Ok(Json(found.into_iter().map(PharmacyRow::from).collect()))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub city:  Option<String>,
  pub limit: Option<usize>,
}

/// `GET /pharmacies[?city=..][&limit=..]`
pub async fn list<S>(
  State(finder): State<DutyFinder<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<PharmacyRow>>, ApiError>
where
  S: PharmacyStore,
{
  let Query(params) = params?;
  let pharmacies = finder
    .list_pharmacies(params.city.as_deref(), params.limit)
    .await?;
  Ok(Json(pharmacies.into_iter().map(PharmacyRow::from).collect()))
}
