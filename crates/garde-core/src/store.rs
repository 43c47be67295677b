//! The `PharmacyStore` trait.
//!
//! Implemented by storage backends (e.g. `garde-store-sqlite`). The query
//! side only reads; the write methods form the contract offered to the
//! import and scrape collaborators.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  duty::{DutyEntry, DutyListing, DutyRecord, NewDuty, ScrapedText},
  geo::{BoundingBox, GeoPoint},
  pharmacy::{NewPharmacy, Pharmacy, PharmacyId},
};

/// A matched duty record joined with its pharmacy, before distance
/// filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct DutyCandidate {
  pub pharmacy: Pharmacy,
  pub scraped:  ScrapedText,
}

/// What a backend error tells the caller about retrying.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` for outages (connection lost, database busy or locked),
  /// `false` for errors that will repeat, such as rows that fail to decode.
  fn is_transient(&self) -> bool;
}

/// Everything the fallback nearby query needs, read from one snapshot so
/// the matched and unmatched halves come from the same roster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbySnapshot {
  /// As [`PharmacyStore::on_duty_within`] for the duty area.
  pub on_duty:    Vec<DutyCandidate>,
  /// As [`PharmacyStore::pharmacies_within`] for the city-inference area.
  pub neighbours: Vec<Pharmacy>,
  /// Every unmatched duty entry of the date, any city.
  pub unmatched:  Vec<DutyListing>,
}

/// Storage seen by [`crate::finder::DutyFinder`] and by the import jobs.
///
/// Each read observes a single committed state of the pharmacies and duty
/// records. Futures are `Send` so a finder can sit in axum state on a
/// multi-threaded runtime.
pub trait PharmacyStore: Send + Sync {
  type Error: StoreError;

  // ── Spatial reads ─────────────────────────────────────────────────────

  /// Matched duty records for `date` whose pharmacy has a location inside
  /// `area`. Must use a spatial index rather than scanning every pharmacy.
  /// Order is unspecified.
  fn on_duty_within(
    &self,
    date: NaiveDate,
    area: BoundingBox,
  ) -> impl Future<Output = Result<Vec<DutyCandidate>, Self::Error>> + Send + '_;

  /// All pharmacies with a location inside `area`, duty status ignored.
  /// Order is unspecified.
  fn pharmacies_within(
    &self,
    area: BoundingBox,
  ) -> impl Future<Output = Result<Vec<Pharmacy>, Self::Error>> + Send + '_;

  /// The three reads behind the fallback nearby query, taken in one read
  /// transaction.
  fn nearby_snapshot(
    &self,
    date: NaiveDate,
    duty_area: BoundingBox,
    city_area: BoundingBox,
  ) -> impl Future<Output = Result<NearbySnapshot, Self::Error>> + Send + '_;

  // ── Plain reads ───────────────────────────────────────────────────────

  /// Every duty record for `date`, matched and unmatched. With `city`, keep
  /// rows whose [`DutyListing::city`] equals it case-insensitively. Order
  /// is unspecified.
  fn duty_listings(
    &self,
    date: NaiveDate,
    city: Option<String>,
  ) -> impl Future<Output = Result<Vec<DutyListing>, Self::Error>> + Send + '_;

  /// Stored pharmacies ordered by city then name, optionally restricted to
  /// one city (case-insensitive).
  fn list_pharmacies(
    &self,
    city: Option<String>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Pharmacy>, Self::Error>> + Send + '_;

  fn get_pharmacy(
    &self,
    id: PharmacyId,
  ) -> impl Future<Output = Result<Option<Pharmacy>, Self::Error>> + Send + '_;

  /// Round-trip to the store.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Import contract ───────────────────────────────────────────────────

  fn add_pharmacy(
    &self,
    input: NewPharmacy,
  ) -> impl Future<Output = Result<Pharmacy, Self::Error>> + Send + '_;

  /// Move (or un-place) a pharmacy; the spatial index follows.
  fn relocate_pharmacy(
    &self,
    id: PharmacyId,
    location: Option<GeoPoint>,
  ) -> impl Future<Output = Result<Pharmacy, Self::Error>> + Send + '_;

  /// Delete a pharmacy and, by cascade, its duty records. Returns `false`
  /// if it did not exist.
  fn delete_pharmacy(
    &self,
    id: PharmacyId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Record one duty entry. A matched entry for a (pharmacy, date) pair
  /// that already exists replaces its scraped text instead of duplicating.
  fn record_duty(
    &self,
    input: NewDuty,
  ) -> impl Future<Output = Result<DutyRecord, Self::Error>> + Send + '_;

  /// Commit a day's scrape in one transaction: drop that day's unmatched
  /// rows, upsert matched entries, insert unmatched ones. Returns the number
  /// of rows written.
  fn replace_duty_roster(
    &self,
    date: NaiveDate,
    entries: Vec<DutyEntry>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete duty records dated strictly before `date`.
  fn purge_duties_before(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
