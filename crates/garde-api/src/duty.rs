//! Handler for `GET /duty`: the full roster for a date, matched and
//! unmatched, ordered by city then name.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use garde_core::{finder::DutyFinder, query::parse_date, store::PharmacyStore};
use serde::Deserialize;

use crate::{error::ApiError, view::PharmacyRow};

#[derive(Debug, Deserialize, Default)]
pub struct DutyParams {
  pub date: Option<String>,
  pub city: Option<String>,
}

/// `GET /duty[?date=YYYY-MM-DD][&city=..]`
pub async fn list<S>(
  State(finder): State<DutyFinder<S>>,
  params: Result<Query<DutyParams>, QueryRejection>,
) -> Result<Json<Vec<PharmacyRow>>, ApiError>
where
  S: PharmacyStore,
{
  let Query(params) = params?;
  let date = params.date.as_deref().map(parse_date).transpose()?;
  let listings = finder.list_on_duty(date, params.city.as_deref()).await?;
  Ok(Json(listings.into_iter().map(PharmacyRow::from).collect()))
}
