//! Query parameters, their validation, and the ranking/ordering policy
//! applied to whatever the store hands back.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  Error, Result,
  duty::{DutyListing, ScrapedText},
  geo::GeoPoint,
  pharmacy::Pharmacy,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for [`crate::finder::DutyFinder`], fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
  /// Radius used by the on-duty query when the caller gives none.
  pub default_radius_m:   f64,
  /// Radius used by the all-pharmacies search when the caller gives none.
  pub search_radius_m:    f64,
  /// Larger requested radii are clamped down to this. `None` = unbounded.
  pub max_radius_m:       Option<f64>,
  /// How far to look for a stored pharmacy when inferring the caller's city.
  pub city_inference_m:   f64,
  pub default_list_limit: usize,
  pub default_search_limit: usize,
  pub max_search_limit:   usize,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      default_radius_m:     5_000.0,
      search_radius_m:      10_000.0,
      max_radius_m:         None,
      city_inference_m:     50_000.0,
      default_list_limit:   100,
      default_search_limit: 50,
      max_search_limit:     200,
    }
  }
}

impl QueryConfig {
  /// Validate a caller-supplied radius, falling back to `default` and
  /// clamping to [`Self::max_radius_m`].
  pub fn resolve_radius(&self, requested: Option<f64>, default: f64) -> Result<f64> {
    let radius = requested.unwrap_or(default);
    if !radius.is_finite() || radius < 0.0 {
      return Err(Error::InvalidRadius(radius));
    }
    match self.max_radius_m {
      Some(max) if radius > max => {
        tracing::warn!(requested = radius, max, "clamping search radius");
        Ok(max)
      }
      _ => Ok(radius),
    }
  }

  pub fn resolve_search_limit(&self, requested: Option<usize>) -> Result<usize> {
    match requested {
      Some(0) => Err(Error::InvalidLimit),
      Some(n) => Ok(n.min(self.max_search_limit)),
      None => Ok(self.default_search_limit),
    }
  }

  pub fn resolve_list_limit(&self, requested: Option<usize>) -> Result<usize> {
    match requested {
      Some(0) => Err(Error::InvalidLimit),
      Some(n) => Ok(n),
      None => Ok(self.default_list_limit),
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Parameters for [`crate::finder::DutyFinder::find_nearby_on_duty`].
#[derive(Debug, Clone, Default)]
pub struct NearbyQuery {
  pub latitude:  f64,
  pub longitude: f64,
  /// Metres; defaults to [`QueryConfig::default_radius_m`].
  pub radius_m:  Option<f64>,
  /// Defaults to the caller's local date.
  pub date:      Option<NaiveDate>,
}

impl NearbyQuery {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self { latitude, longitude, ..Self::default() }
  }

  pub fn radius(mut self, radius_m: f64) -> Self {
    self.radius_m = Some(radius_m);
    self
  }

  pub fn on(mut self, date: NaiveDate) -> Self {
    self.date = Some(date);
    self
  }
}

/// Parameters for [`crate::finder::DutyFinder::search_nearby`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
  pub latitude:  f64,
  pub longitude: f64,
  pub radius_m:  Option<f64>,
  pub limit:     Option<usize>,
}

/// Parse an ISO 8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
    .map_err(|_| Error::InvalidDate(s.to_owned()))
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// An on-duty pharmacy within the search radius.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPharmacy {
  pub pharmacy:   Pharmacy,
  pub scraped:    ScrapedText,
  pub distance_m: f64,
}

/// A pharmacy within the search radius, duty status ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PharmacyDistance {
  pub pharmacy:   Pharmacy,
  pub distance_m: f64,
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// Keep the items whose pharmacy lies within `radius_m` of `origin` and
/// order them by distance, then by pharmacy identity.
///
/// Items without a location are dropped. If the same pharmacy appears more
/// than once (overlapping index spans) only one copy is kept.
pub fn rank_by_distance<T>(
  origin: GeoPoint,
  radius_m: f64,
  items: Vec<T>,
  pharmacy: impl Fn(&T) -> &Pharmacy,
) -> Vec<(T, f64)> {
  let mut ranked: Vec<(T, f64)> = items
    .into_iter()
    .filter_map(|item| {
      let distance = origin.distance_to(pharmacy(&item).location.as_ref()?);
      (distance <= radius_m).then_some((item, distance))
    })
    .collect();

  ranked.sort_by(|(a, da), (b, db)| {
    da.total_cmp(db).then_with(|| pharmacy(a).id.cmp(&pharmacy(b).id))
  });
  ranked.dedup_by(|(a, _), (b, _)| pharmacy(&*a).id == pharmacy(&*b).id);
  ranked
}

/// Case-insensitive codepoint order with missing values last.
fn cmp_text(a: Option<&str>, b: Option<&str>) -> Ordering {
  match (a, b) {
    (Some(a), Some(b)) => fold_key(a).cmp(&fold_key(b)),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}

/// Order duty listings by city, then name, then duty identity.
pub fn sort_listings(listings: &mut [DutyListing]) {
  listings.sort_by(|a, b| {
    cmp_text(a.city(), b.city())
      .then_with(|| cmp_text(a.name(), b.name()))
      .then_with(|| a.duty_id().cmp(&b.duty_id()))
  });
}

/// Normalised form of a city or name for case-insensitive matching and
/// ordering. Stores persist it alongside the original text.
pub fn fold_key(s: &str) -> String { s.trim().to_lowercase() }

/// Case-insensitive city comparison used by every city filter.
pub fn same_city(a: &str, b: &str) -> bool { fold_key(a) == fold_key(b) }

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    duty::DutyId,
    pharmacy::{PharmacyId, Provenance},
  };

  fn pharmacy(id: i64, name: &str, city: Option<&str>, at: Option<(f64, f64)>) -> Pharmacy {
    Pharmacy {
      id:         PharmacyId(id),
      name:       name.to_owned(),
      address:    None,
      phone:      None,
      city:       city.map(str::to_owned),
      region:     None,
      location:   at.map(|(lat, lon)| GeoPoint::new(lat, lon).unwrap()),
      provenance: Provenance::Manual,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn radius_defaults_and_validation() {
    let cfg = QueryConfig::default();
    assert_eq!(cfg.resolve_radius(None, cfg.default_radius_m).unwrap(), 5_000.0);
    assert_eq!(cfg.resolve_radius(Some(0.0), 5_000.0).unwrap(), 0.0);
    assert!(matches!(
      cfg.resolve_radius(Some(-1.0), 5_000.0),
      Err(Error::InvalidRadius(_))
    ));
    assert!(matches!(
      cfg.resolve_radius(Some(f64::INFINITY), 5_000.0),
      Err(Error::InvalidRadius(_))
    ));
    assert_eq!(cfg.resolve_radius(Some(500_000.0), 5_000.0).unwrap(), 500_000.0);
  }

  #[test]
  fn radius_is_clamped_to_configured_maximum() {
    let cfg = QueryConfig { max_radius_m: Some(50_000.0), ..QueryConfig::default() };
    assert_eq!(cfg.resolve_radius(Some(80_000.0), 5_000.0).unwrap(), 50_000.0);
    assert_eq!(cfg.resolve_radius(Some(20_000.0), 5_000.0).unwrap(), 20_000.0);
  }

  #[test]
  fn search_limit_is_clamped() {
    let cfg = QueryConfig::default();
    assert_eq!(cfg.resolve_search_limit(None).unwrap(), 50);
    assert_eq!(cfg.resolve_search_limit(Some(1_000)).unwrap(), 200);
    assert!(matches!(cfg.resolve_search_limit(Some(0)), Err(Error::InvalidLimit)));
  }

  #[test]
  fn parses_iso_dates_only() {
    assert_eq!(
      parse_date("2024-06-01").unwrap(),
      NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    );
    assert!(matches!(parse_date("01/06/2024"), Err(Error::InvalidDate(_))));
    assert!(matches!(parse_date("2024-02-30"), Err(Error::InvalidDate(_))));
  }

  #[test]
  fn ranking_filters_sorts_and_breaks_ties_by_id() {
    let origin = GeoPoint::new(3.8480, 11.5021).unwrap();
    let items = vec![
      pharmacy(3, "far", None, Some((3.9, 11.5021))),
      pharmacy(2, "twin b", None, Some((3.8490, 11.5021))),
      pharmacy(1, "twin a", None, Some((3.8490, 11.5021))),
      pharmacy(4, "nowhere", None, None),
      pharmacy(5, "out of range", None, Some((4.0511, 9.7043))),
    ];

    let ranked = rank_by_distance(origin, 10_000.0, items, |p| p);
    let ids: Vec<i64> = ranked.iter().map(|(p, _)| p.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(ranked.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(ranked.iter().all(|(_, d)| *d <= 10_000.0));
  }

  #[test]
  fn ranking_drops_duplicate_pharmacies() {
    let origin = GeoPoint::new(0.0, 0.0).unwrap();
    let p = pharmacy(9, "dup", None, Some((0.001, 0.0)));
    let ranked = rank_by_distance(origin, 1_000.0, vec![p.clone(), p], |p| p);
    assert_eq!(ranked.len(), 1);
  }

  #[test]
  fn listings_sort_by_city_then_name_case_insensitively() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let mut listings = vec![
      DutyListing::Unmatched {
        duty_id: DutyId(1),
        date,
        scraped: ScrapedText::new("zeta", None, Some("yaoundé")),
      },
      DutyListing::Matched {
        duty_id:  DutyId(2),
        date,
        pharmacy: pharmacy(1, "Alpha", Some("Yaoundé"), None),
        scraped:  ScrapedText::default(),
      },
      DutyListing::Unmatched {
        duty_id: DutyId(3),
        date,
        scraped: ScrapedText::new("Beta", None, Some("Douala")),
      },
      DutyListing::Unmatched {
        duty_id: DutyId(4),
        date,
        scraped: ScrapedText::new("No city", None, None),
      },
    ];

    sort_listings(&mut listings);
    let ids: Vec<i64> = listings.iter().map(|l| l.duty_id().0).collect();
    assert_eq!(ids, vec![3, 2, 1, 4]);
  }
}
