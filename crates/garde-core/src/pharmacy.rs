//! Pharmacy records as stored by the import collaborators.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Database-assigned identity. The only uniqueness a pharmacy has; names
/// and addresses are not keys.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PharmacyId(pub i64);

impl fmt::Display for PharmacyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// How a pharmacy record entered the store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
  /// Map data: OpenStreetMap extracts, KML/KMZ exports.
  MapImport,
  /// Scraped from a business or medical directory.
  DirectoryImport,
  #[default]
  Manual,
}

impl Provenance {
  /// The tag stored in the `provenance` column; matches the serde names.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::MapImport => "map_import",
      Self::DirectoryImport => "directory_import",
      Self::Manual => "manual",
    }
  }
}

impl FromStr for Provenance {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "map_import" => Ok(Self::MapImport),
      "directory_import" => Ok(Self::DirectoryImport),
      "manual" => Ok(Self::Manual),
      other => Err(format!("unknown provenance: {other:?}")),
    }
  }
}

// ─── Pharmacy ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pharmacy {
  pub id:         PharmacyId,
  pub name:       String,
  pub address:    Option<String>,
  pub phone:      Option<String>,
  pub city:       Option<String>,
  pub region:     Option<String>,
  /// `None` when the import could not place the pharmacy on the map; such
  /// rows can never be distance-ranked.
  pub location:   Option<GeoPoint>,
  pub provenance: Provenance,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::PharmacyStore::add_pharmacy`]. Identity and
/// timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPharmacy {
  pub name:       String,
  pub address:    Option<String>,
  pub phone:      Option<String>,
  pub city:       Option<String>,
  pub region:     Option<String>,
  pub location:   Option<GeoPoint>,
  pub provenance: Provenance,
}

impl NewPharmacy {
  /// Convenience constructor with all optional fields empty.
  pub fn new(name: impl Into<String>, provenance: Provenance) -> Self {
    Self {
      name: name.into(),
      address: None,
      phone: None,
      city: None,
      region: None,
      location: None,
      provenance,
    }
  }
}
