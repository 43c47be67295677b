//! Duty records: which pharmacy is "de garde" on which date.
//!
//! The daily scrape cannot always tie a scraped name to a stored pharmacy,
//! so a duty entry is either [`DutyEntry::Matched`] (it references a
//! pharmacy and can be distance-ranked) or [`DutyEntry::Unmatched`] (only
//! the scraped text survives). Both shapes are expected data, not errors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pharmacy::{Pharmacy, PharmacyId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DutyId(pub i64);

/// Free text captured by the scraper, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedText {
  pub name:    Option<String>,
  /// Neighbourhood ("quartier") as printed on the duty roster.
  pub quarter: Option<String>,
  pub city:    Option<String>,
}

impl ScrapedText {
  pub fn new(
    name: impl Into<String>,
    quarter: Option<&str>,
    city: Option<&str>,
  ) -> Self {
    Self {
      name:    Some(name.into()),
      quarter: quarter.map(str::to_owned),
      city:    city.map(str::to_owned),
    }
  }
}

// ─── DutyEntry ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DutyEntry {
  Matched {
    pharmacy_id: PharmacyId,
    #[serde(default)]
    scraped:     ScrapedText,
  },
  Unmatched {
    scraped: ScrapedText,
  },
}

impl DutyEntry {
  pub fn matched(pharmacy_id: PharmacyId) -> Self {
    Self::Matched { pharmacy_id, scraped: ScrapedText::default() }
  }

  pub fn unmatched(scraped: ScrapedText) -> Self { Self::Unmatched { scraped } }

  pub fn pharmacy_id(&self) -> Option<PharmacyId> {
    match self {
      Self::Matched { pharmacy_id, .. } => Some(*pharmacy_id),
      Self::Unmatched { .. } => None,
    }
  }

  pub fn scraped(&self) -> &ScrapedText {
    match self {
      Self::Matched { scraped, .. } | Self::Unmatched { scraped } => scraped,
    }
  }
}

/// A stored duty record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutyRecord {
  pub duty_id: DutyId,
  pub date:    NaiveDate,
  pub entry:   DutyEntry,
}

/// Input to [`crate::store::PharmacyStore::record_duty`].
#[derive(Debug, Clone)]
pub struct NewDuty {
  pub date:  NaiveDate,
  pub entry: DutyEntry,
}

// ─── DutyListing ─────────────────────────────────────────────────────────────

/// One row of the unfiltered duty list: a duty record joined with its
/// pharmacy when there is one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DutyListing {
  Matched {
    duty_id:  DutyId,
    date:     NaiveDate,
    pharmacy: Pharmacy,
    scraped:  ScrapedText,
  },
  Unmatched {
    duty_id: DutyId,
    date:    NaiveDate,
    scraped: ScrapedText,
  },
}

impl DutyListing {
  pub fn duty_id(&self) -> DutyId {
    match self {
      Self::Matched { duty_id, .. } | Self::Unmatched { duty_id, .. } => *duty_id,
    }
  }

  pub fn is_matched(&self) -> bool { matches!(self, Self::Matched { .. }) }

  pub fn scraped(&self) -> &ScrapedText {
    match self {
      Self::Matched { scraped, .. } | Self::Unmatched { scraped, .. } => scraped,
    }
  }

  /// Display name: the stored name when matched, the scraped one otherwise.
  pub fn name(&self) -> Option<&str> {
    match self {
      Self::Matched { pharmacy, .. } => Some(pharmacy.name.as_str()),
      Self::Unmatched { scraped, .. } => scraped.name.as_deref(),
    }
  }

  /// City used for filtering and ordering. Matched rows fall back to the
  /// scraped city when the stored pharmacy has none.
  pub fn city(&self) -> Option<&str> {
    match self {
      Self::Matched { pharmacy, scraped, .. } => {
        pharmacy.city.as_deref().or(scraped.city.as_deref())
      }
      Self::Unmatched { scraped, .. } => scraped.city.as_deref(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entry_serialises_with_kind_tag() {
    let entry = DutyEntry::matched(PharmacyId(7));
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["kind"], "matched");
    assert_eq!(json["pharmacy_id"], 7);

    let entry = DutyEntry::unmatched(ScrapedText::new(
      "Pharmacie X",
      Some("Mvog-Mbi"),
      Some("Yaoundé"),
    ));
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["kind"], "unmatched");
    assert_eq!(json["scraped"]["name"], "Pharmacie X");
    assert!(entry.pharmacy_id().is_none());
  }
}
