//! The flat pharmacy object every list endpoint returns.
//!
//! Matched and unmatched rows share one shape so clients can render a mixed
//! list; an unmatched row has no id, point or distance.

use garde_core::{
  duty::{DutyListing, ScrapedText},
  pharmacy::{Pharmacy, PharmacyId, Provenance},
  query::{NearbyPharmacy, PharmacyDistance},
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
  Matched,
  Unmatched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PharmacyRow {
  pub id:              Option<PharmacyId>,
  pub name:            Option<String>,
  pub address:         Option<String>,
  pub phone:           Option<String>,
  pub city:            Option<String>,
  pub latitude:        Option<f64>,
  pub longitude:       Option<f64>,
  /// Metres, rounded to centimetres.
  pub distance_m:      Option<f64>,
  pub provenance:      Option<Provenance>,
  pub kind:            RowKind,
  pub scraped_name:    Option<String>,
  pub scraped_quarter: Option<String>,
  pub scraped_city:    Option<String>,
}

fn round_cm(metres: f64) -> f64 { (metres * 100.0).round() / 100.0 }

impl PharmacyRow {
  fn from_pharmacy(p: Pharmacy, distance_m: Option<f64>, scraped: ScrapedText) -> Self {
    Self {
      id:              Some(p.id),
      name:            Some(p.name),
      address:         p.address,
      phone:           p.phone,
      city:            p.city,
      latitude:        p.location.map(|l| l.latitude()),
      longitude:       p.location.map(|l| l.longitude()),
      distance_m:      distance_m.map(round_cm),
      provenance:      Some(p.provenance),
      kind:            RowKind::Matched,
      scraped_name:    scraped.name,
      scraped_quarter: scraped.quarter,
      scraped_city:    scraped.city,
    }
  }

  fn from_scraped(scraped: ScrapedText) -> Self {
    Self {
      id:              None,
      name:            scraped.name.clone(),
      address:         scraped.quarter.clone(),
      phone:           None,
      city:            scraped.city.clone(),
      latitude:        None,
      longitude:       None,
      distance_m:      None,
      provenance:      None,
      kind:            RowKind::Unmatched,
      scraped_name:    scraped.name,
      scraped_quarter: scraped.quarter,
      scraped_city:    scraped.city,
    }
  }
}

impl From<NearbyPharmacy> for PharmacyRow {
  fn from(n: NearbyPharmacy) -> Self {
    Self::from_pharmacy(n.pharmacy, Some(n.distance_m), n.scraped)
  }
}

impl From<PharmacyDistance> for PharmacyRow {
  fn from(p: PharmacyDistance) -> Self {
    Self::from_pharmacy(p.pharmacy, Some(p.distance_m), ScrapedText::default())
  }
}

impl From<Pharmacy> for PharmacyRow {
  fn from(p: Pharmacy) -> Self { Self::from_pharmacy(p, None, ScrapedText::default()) }
}

impl From<DutyListing> for PharmacyRow {
  fn from(listing: DutyListing) -> Self {
    match listing {
      DutyListing::Matched { pharmacy, scraped, .. } => {
        Self::from_pharmacy(pharmacy, None, scraped)
      }
      DutyListing::Unmatched { scraped, .. } => Self::from_scraped(scraped),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distance_is_rounded_to_two_decimals() {
    assert_eq!(round_cm(1234.5678), 1234.57);
    assert_eq!(round_cm(0.0), 0.0);
  }

  #[test]
  fn unmatched_rows_carry_nulls() {
    let row = PharmacyRow::from_scraped(ScrapedText::new("PHCIE X", Some("Akwa"), Some("Douala")));
    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["kind"], "unmatched");
    assert!(json["id"].is_null());
    assert!(json["latitude"].is_null());
    assert!(json["distance_m"].is_null());
    assert_eq!(json["name"], "PHCIE X");
    assert_eq!(json["scraped_quarter"], "Akwa");
  }
}
