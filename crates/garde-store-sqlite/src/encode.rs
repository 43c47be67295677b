//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as
//! `YYYY-MM-DD` (so text comparison orders them), coordinates as REAL
//! degrees.

use chrono::{DateTime, NaiveDate, Utc};
use garde_core::{
  duty::{DutyId, DutyListing, ScrapedText},
  geo::GeoPoint,
  pharmacy::{Pharmacy, PharmacyId, Provenance},
  store::DutyCandidate,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Provenance ──────────────────────────────────────────────────────────────

pub fn decode_provenance(s: &str) -> Result<Provenance> {
  s.parse().map_err(Error::Decode)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Pharmacy columns in the order [`RawPharmacy::read`] expects, qualified
/// with the `p` alias.
pub const PHARMACY_COLUMNS: &str = "p.id, p.name, p.address, p.phone, p.city, \
   p.region, p.latitude, p.longitude, p.provenance, p.created_at, p.updated_at";

/// Number of columns in [`PHARMACY_COLUMNS`].
pub const PHARMACY_WIDTH: usize = 11;

/// Raw values read directly from a `pharmacies` row.
pub struct RawPharmacy {
  pub id:         i64,
  pub name:       String,
  pub address:    Option<String>,
  pub phone:      Option<String>,
  pub city:       Option<String>,
  pub region:     Option<String>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
  pub provenance: String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawPharmacy {
  /// Read [`PHARMACY_COLUMNS`] starting at column `at`.
  pub fn read(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(at)?,
      name:       row.get(at + 1)?,
      address:    row.get(at + 2)?,
      phone:      row.get(at + 3)?,
      city:       row.get(at + 4)?,
      region:     row.get(at + 5)?,
      latitude:   row.get(at + 6)?,
      longitude:  row.get(at + 7)?,
      provenance: row.get(at + 8)?,
      created_at: row.get(at + 9)?,
      updated_at: row.get(at + 10)?,
    })
  }

  pub fn into_pharmacy(self) -> Result<Pharmacy> {
    let location = match (self.latitude, self.longitude) {
      (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
      _ => None,
    };

    Ok(Pharmacy {
      id: PharmacyId(self.id),
      name: self.name,
      address: self.address,
      phone: self.phone,
      city: self.city,
      region: self.region,
      location,
      provenance: decode_provenance(&self.provenance)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw scraped-text columns (`scraped_name, scraped_quarter, scraped_city`).
pub struct RawScraped {
  pub name:    Option<String>,
  pub quarter: Option<String>,
  pub city:    Option<String>,
}

impl RawScraped {
  pub fn read(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      name:    row.get(at)?,
      quarter: row.get(at + 1)?,
      city:    row.get(at + 2)?,
    })
  }

  pub fn into_scraped(self) -> ScrapedText {
    ScrapedText { name: self.name, quarter: self.quarter, city: self.city }
  }
}

/// A matched duty row joined with its pharmacy.
pub struct RawCandidate {
  pub pharmacy: RawPharmacy,
  pub scraped:  RawScraped,
}

impl RawCandidate {
  pub fn into_candidate(self) -> Result<DutyCandidate> {
    Ok(DutyCandidate {
      pharmacy: self.pharmacy.into_pharmacy()?,
      scraped:  self.scraped.into_scraped(),
    })
  }
}

/// A duty row, left-joined with its pharmacy when it has one.
pub struct RawDuty {
  pub duty_id:     i64,
  pub pharmacy_id: Option<i64>,
  pub duty_date:   String,
  pub scraped:     RawScraped,
  pub pharmacy:    Option<RawPharmacy>,
}

impl RawDuty {
  pub fn into_listing(self) -> Result<DutyListing> {
    let duty_id = DutyId(self.duty_id);
    let date = decode_date(&self.duty_date)?;
    let scraped = self.scraped.into_scraped();
    match (self.pharmacy_id, self.pharmacy) {
      (Some(_), Some(raw)) => Ok(DutyListing::Matched {
        duty_id,
        date,
        pharmacy: raw.into_pharmacy()?,
        scraped,
      }),
      (None, _) => Ok(DutyListing::Unmatched { duty_id, date, scraped }),
      (Some(id), None) => Err(Error::Decode(format!(
        "duty {duty_id:?} references missing pharmacy {id}"
      ))),
    }
  }
}
