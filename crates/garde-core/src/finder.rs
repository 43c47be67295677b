//! [`DutyFinder`], the duty-aware nearest-pharmacy query.
//!
//! The store narrows candidates with its spatial index; the finder owns
//! everything else: input validation, defaults, geodesic distance, radius
//! filtering and result order. It holds no mutable state, so one instance
//! can serve any number of concurrent callers.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::{
  Error, Result,
  duty::DutyListing,
  geo::{BoundingBox, GeoPoint},
  pharmacy::Pharmacy,
  query::{
    NearbyPharmacy, NearbyQuery, PharmacyDistance, QueryConfig, SearchQuery,
    rank_by_distance, same_city, sort_listings,
  },
  store::{DutyCandidate, PharmacyStore},
};

/// A blank city filter means no filter.
fn city_filter(city: Option<&str>) -> Option<String> {
  city.map(str::trim).filter(|c| !c.is_empty()).map(str::to_owned)
}

/// The caller's calendar date, used when a query names none.
pub fn today() -> NaiveDate { Local::now().date_naive() }

/// A validated on-duty query with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Resolved {
  origin:   GeoPoint,
  radius_m: f64,
  date:     NaiveDate,
}

/// Result of [`DutyFinder::nearby_with_fallback`].
#[derive(Debug, Clone, Serialize)]
pub struct NearbyReport {
  pub date:          NaiveDate,
  pub radius_m:      f64,
  /// On-duty pharmacies within the radius, nearest first.
  pub matched:       Vec<NearbyPharmacy>,
  /// The inferred city, if any stored pharmacy was close enough to tell.
  pub inferred_city: Option<String>,
  /// That city's unmatched duty entries, by name.
  pub unmatched:     Vec<DutyListing>,
}

// ─── DutyFinder ──────────────────────────────────────────────────────────────

pub struct DutyFinder<S> {
  store:  Arc<S>,
  config: QueryConfig,
}

impl<S> Clone for DutyFinder<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), config: self.config.clone() }
  }
}

impl<S: PharmacyStore> DutyFinder<S> {
  pub fn new(store: Arc<S>, config: QueryConfig) -> Self { Self { store, config } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &QueryConfig { &self.config }

  fn resolve(&self, query: &NearbyQuery) -> Result<Resolved> {
    let origin = GeoPoint::new(query.latitude, query.longitude)?;
    let radius_m = self
      .config
      .resolve_radius(query.radius_m, self.config.default_radius_m)?;
    Ok(Resolved { origin, radius_m, date: query.date.unwrap_or_else(today) })
  }

  fn rank_on_duty(q: Resolved, candidates: Vec<DutyCandidate>) -> Vec<NearbyPharmacy> {
    let fetched = candidates.len();
    let ranked: Vec<NearbyPharmacy> =
      rank_by_distance(q.origin, q.radius_m, candidates, |c| &c.pharmacy)
        .into_iter()
        .map(|(c, distance_m)| NearbyPharmacy {
          pharmacy: c.pharmacy,
          scraped: c.scraped,
          distance_m,
        })
        .collect();

    tracing::debug!(
      latitude = q.origin.latitude(),
      longitude = q.origin.longitude(),
      radius_m = q.radius_m,
      date = %q.date,
      fetched,
      returned = ranked.len(),
      "on-duty query"
    );
    ranked
  }

  /// City of the nearest pharmacy in `neighbours` that has one, within
  /// [`QueryConfig::city_inference_m`].
  fn nearest_city(&self, origin: GeoPoint, neighbours: Vec<Pharmacy>) -> Option<String> {
    rank_by_distance(origin, self.config.city_inference_m, neighbours, |p| p)
      .into_iter()
      .find_map(|(p, _)| p.city)
  }

  /// On-duty pharmacies within the radius of a point, nearest first, ties
  /// broken by pharmacy identity. Unmatched duty entries are never
  /// included; an empty result is not an error.
  pub async fn find_nearby_on_duty(
    &self,
    query: &NearbyQuery,
  ) -> Result<Vec<NearbyPharmacy>> {
    let q = self.resolve(query)?;
    let candidates = self
      .store
      .on_duty_within(q.date, BoundingBox::around(q.origin, q.radius_m))
      .await
      .map_err(Error::store)?;
    Ok(Self::rank_on_duty(q, candidates))
  }

  /// The whole duty roster for a date (default today), including entries
  /// that could not be matched to a stored pharmacy. Ordered by city then
  /// name.
  pub async fn list_on_duty(
    &self,
    date: Option<NaiveDate>,
    city: Option<&str>,
  ) -> Result<Vec<DutyListing>> {
    let date = date.unwrap_or_else(today);
    let city = city_filter(city);
    let mut listings = self
      .store
      .duty_listings(date, city.clone())
      .await
      .map_err(Error::store)?;
    sort_listings(&mut listings);
    tracing::debug!(%date, ?city, returned = listings.len(), "duty list");
    Ok(listings)
  }

  /// Every stored pharmacy within the radius, duty status ignored.
  pub async fn search_nearby(
    &self,
    query: &SearchQuery,
  ) -> Result<Vec<PharmacyDistance>> {
    let origin = GeoPoint::new(query.latitude, query.longitude)?;
    let radius_m = self
      .config
      .resolve_radius(query.radius_m, self.config.search_radius_m)?;
    let limit = self.config.resolve_search_limit(query.limit)?;

    let pharmacies = self
      .store
      .pharmacies_within(BoundingBox::around(origin, radius_m))
      .await
      .map_err(Error::store)?;

    Ok(
      rank_by_distance(origin, radius_m, pharmacies, |p| p)
        .into_iter()
        .take(limit)
        .map(|(pharmacy, distance_m)| PharmacyDistance { pharmacy, distance_m })
        .collect(),
    )
  }

  pub async fn list_pharmacies(
    &self,
    city: Option<&str>,
    limit: Option<usize>,
  ) -> Result<Vec<Pharmacy>> {
    let limit = self.config.resolve_list_limit(limit)?;
    self
      .store
      .list_pharmacies(city_filter(city), limit)
      .await
      .map_err(Error::store)
  }

  /// The city of the nearest stored pharmacy that has one, looking no
  /// further than [`QueryConfig::city_inference_m`].
  pub async fn infer_city(&self, origin: GeoPoint) -> Result<Option<String>> {
    let pharmacies = self
      .store
      .pharmacies_within(BoundingBox::around(origin, self.config.city_inference_m))
      .await
      .map_err(Error::store)?;
    Ok(self.nearest_city(origin, pharmacies))
  }

  /// The on-duty query plus a degraded fallback: the unmatched duty entries
  /// of the caller's inferred city, which have no location but can still
  /// be shown by name. Both halves come from one store snapshot.
  pub async fn nearby_with_fallback(&self, query: &NearbyQuery) -> Result<NearbyReport> {
    let q = self.resolve(query)?;
    let snapshot = self
      .store
      .nearby_snapshot(
        q.date,
        BoundingBox::around(q.origin, q.radius_m),
        BoundingBox::around(q.origin, self.config.city_inference_m),
      )
      .await
      .map_err(Error::store)?;

    let matched = Self::rank_on_duty(q, snapshot.on_duty);
    let inferred_city = self.nearest_city(q.origin, snapshot.neighbours);

    let mut unmatched: Vec<DutyListing> = match &inferred_city {
      Some(city) => snapshot
        .unmatched
        .into_iter()
        .filter(|l| !l.is_matched() && l.city().is_some_and(|c| same_city(c, city)))
        .collect(),
      None => Vec::new(),
    };
    sort_listings(&mut unmatched);

    Ok(NearbyReport {
      date: q.date,
      radius_m: q.radius_m,
      matched,
      inferred_city,
      unmatched,
    })
  }

  pub async fn health(&self) -> Result<()> {
    self.store.ping().await.map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use chrono::Utc;

  use super::*;
  use crate::{
    duty::{DutyEntry, DutyId, DutyRecord, NewDuty, ScrapedText},
    pharmacy::{NewPharmacy, PharmacyId, Provenance},
    store::{NearbySnapshot, StoreError},
  };

  // ── In-memory store ───────────────────────────────────────────────────

  #[derive(Debug, Clone, Copy, thiserror::Error)]
  enum Fault {
    #[error("store offline")]
    Offline,
    #[error("unreadable row")]
    BadRow,
  }

  impl StoreError for Fault {
    fn is_transient(&self) -> bool { matches!(self, Fault::Offline) }
  }

  #[derive(Default)]
  struct MemoryStore {
    fault:      Option<Fault>,
    pharmacies: Mutex<Vec<Pharmacy>>,
    duties:     Mutex<Vec<DutyRecord>>,
  }

  impl MemoryStore {
    fn check(&self) -> Result<(), Fault> {
      match self.fault {
        Some(fault) => Err(fault),
        None => Ok(()),
      }
    }

    fn pharmacy(&self, id: PharmacyId) -> Option<Pharmacy> {
      self.pharmacies.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }
  }

  impl PharmacyStore for MemoryStore {
    type Error = Fault;

    async fn on_duty_within(
      &self,
      date: NaiveDate,
      area: BoundingBox,
    ) -> Result<Vec<DutyCandidate>, Fault> {
      self.check()?;
      let duties = self.duties.lock().unwrap().clone();
      Ok(
        duties
          .into_iter()
          .filter(|d| d.date == date)
          .filter_map(|d| match d.entry {
            DutyEntry::Matched { pharmacy_id, scraped } => self
              .pharmacy(pharmacy_id)
              .map(|pharmacy| DutyCandidate { pharmacy, scraped }),
            DutyEntry::Unmatched { .. } => None,
          })
          .filter(|c| c.pharmacy.location.is_some_and(|p| area.contains(&p)))
          .collect(),
      )
    }

    async fn pharmacies_within(&self, area: BoundingBox) -> Result<Vec<Pharmacy>, Fault> {
      self.check()?;
      Ok(
        self
          .pharmacies
          .lock()
          .unwrap()
          .iter()
          .filter(|p| p.location.is_some_and(|l| area.contains(&l)))
          .cloned()
          .collect(),
      )
    }

    async fn nearby_snapshot(
      &self,
      date: NaiveDate,
      duty_area: BoundingBox,
      city_area: BoundingBox,
    ) -> Result<NearbySnapshot, Fault> {
      Ok(NearbySnapshot {
        on_duty:    self.on_duty_within(date, duty_area).await?,
        neighbours: self.pharmacies_within(city_area).await?,
        unmatched:  self
          .duty_listings(date, None)
          .await?
          .into_iter()
          .filter(|l| !l.is_matched())
          .collect(),
      })
    }

    async fn duty_listings(
      &self,
      date: NaiveDate,
      city: Option<String>,
    ) -> Result<Vec<DutyListing>, Fault> {
      self.check()?;
      let duties = self.duties.lock().unwrap().clone();
      Ok(
        duties
          .into_iter()
          .filter(|d| d.date == date)
          .filter_map(|d| match d.entry {
            DutyEntry::Matched { pharmacy_id, scraped } => {
              self.pharmacy(pharmacy_id).map(|pharmacy| DutyListing::Matched {
                duty_id: d.duty_id,
                date,
                pharmacy,
                scraped,
              })
            }
            DutyEntry::Unmatched { scraped } => {
              Some(DutyListing::Unmatched { duty_id: d.duty_id, date, scraped })
            }
          })
          .filter(|l| match (&city, l.city()) {
            (None, _) => true,
            (Some(want), Some(have)) => same_city(want, have),
            (Some(_), None) => false,
          })
          .collect(),
      )
    }

    async fn list_pharmacies(
      &self,
      city: Option<String>,
      limit: usize,
    ) -> Result<Vec<Pharmacy>, Fault> {
      self.check()?;
      Ok(
        self
          .pharmacies
          .lock()
          .unwrap()
          .iter()
          .filter(|p| match (&city, &p.city) {
            (None, _) => true,
            (Some(want), Some(have)) => same_city(want, have),
            (Some(_), None) => false,
          })
          .take(limit)
          .cloned()
          .collect(),
      )
    }

    async fn get_pharmacy(&self, id: PharmacyId) -> Result<Option<Pharmacy>, Fault> {
      self.check()?;
      Ok(self.pharmacy(id))
    }

    async fn ping(&self) -> Result<(), Fault> { self.check() }

    async fn add_pharmacy(&self, input: NewPharmacy) -> Result<Pharmacy, Fault> {
      self.check()?;
      let mut pharmacies = self.pharmacies.lock().unwrap();
      let pharmacy = Pharmacy {
        id:         PharmacyId(pharmacies.len() as i64 + 1),
        name:       input.name,
        address:    input.address,
        phone:      input.phone,
        city:       input.city,
        region:     input.region,
        location:   input.location,
        provenance: input.provenance,
        created_at: Utc::now(),
        updated_at: Utc::now(),
      };
      pharmacies.push(pharmacy.clone());
      Ok(pharmacy)
    }

    async fn relocate_pharmacy(
      &self,
      _id: PharmacyId,
      _location: Option<GeoPoint>,
    ) -> Result<Pharmacy, Fault> {
      unimplemented!("not needed by these tests")
    }

    async fn delete_pharmacy(&self, _id: PharmacyId) -> Result<bool, Fault> {
      unimplemented!("not needed by these tests")
    }

    async fn record_duty(&self, input: NewDuty) -> Result<DutyRecord, Fault> {
      self.check()?;
      let mut duties = self.duties.lock().unwrap();
      let record = DutyRecord {
        duty_id: DutyId(duties.len() as i64 + 1),
        date:    input.date,
        entry:   input.entry,
      };
      duties.push(record.clone());
      Ok(record)
    }

    async fn replace_duty_roster(
      &self,
      _date: NaiveDate,
      _entries: Vec<DutyEntry>,
    ) -> Result<usize, Fault> {
      unimplemented!("not needed by these tests")
    }

    async fn purge_duties_before(&self, _date: NaiveDate) -> Result<u64, Fault> {
      unimplemented!("not needed by these tests")
    }
  }

  // ── Fixtures ──────────────────────────────────────────────────────────

  fn june_first() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() }

  async fn add(
    store: &MemoryStore,
    name: &str,
    city: Option<&str>,
    at: Option<(f64, f64)>,
  ) -> Pharmacy {
    let mut input = NewPharmacy::new(name, Provenance::MapImport);
    input.city = city.map(str::to_owned);
    input.location = at.map(|(lat, lon)| GeoPoint::new(lat, lon).unwrap());
    store.add_pharmacy(input).await.unwrap()
  }

  async fn on_duty(store: &MemoryStore, entry: DutyEntry) {
    store.record_duty(NewDuty { date: june_first(), entry }).await.unwrap();
  }

  /// Pharmacy A in Yaoundé and B in Douala, both on duty 2024-06-01, plus
  /// an unmatched "Pharmacie X" in Yaoundé.
  async fn scenario() -> DutyFinder<MemoryStore> {
    let store = MemoryStore::default();
    let a = add(&store, "A", Some("Yaoundé"), Some((3.8480, 11.5021))).await;
    let b = add(&store, "B", Some("Douala"), Some((4.0511, 9.7043))).await;
    on_duty(&store, DutyEntry::matched(a.id)).await;
    on_duty(&store, DutyEntry::matched(b.id)).await;
    on_duty(
      &store,
      DutyEntry::unmatched(ScrapedText::new("Pharmacie X", None, Some("Yaoundé"))),
    )
    .await;
    DutyFinder::new(Arc::new(store), QueryConfig::default())
  }

  // ── Tests ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn small_radius_returns_only_the_pharmacy_at_the_point() {
    let finder = scenario().await;
    let found = finder
      .find_nearby_on_duty(&NearbyQuery::new(3.8480, 11.5021).radius(10_000.0).on(june_first()))
      .await
      .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].pharmacy.name, "A");
    assert_eq!(found[0].distance_m, 0.0);
  }

  #[tokio::test]
  async fn large_radius_returns_both_nearest_first() {
    let finder = scenario().await;
    let found = finder
      .find_nearby_on_duty(&NearbyQuery::new(3.8480, 11.5021).radius(500_000.0).on(june_first()))
      .await
      .unwrap();
    let names: Vec<&str> = found.iter().map(|f| f.pharmacy.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);

    let expected = GeoPoint::new(3.8480, 11.5021)
      .unwrap()
      .distance_to(&GeoPoint::new(4.0511, 9.7043).unwrap());
    assert!((found[1].distance_m - expected).abs() < 1e-6);
  }

  #[tokio::test]
  async fn unmatched_entries_only_appear_in_the_duty_list() {
    let finder = scenario().await;
    let found = finder
      .find_nearby_on_duty(&NearbyQuery::new(3.8480, 11.5021).radius(20_000_000.0).on(june_first()))
      .await
      .unwrap();
    assert_eq!(found.len(), 2);

    let listed = finder.list_on_duty(Some(june_first()), None).await.unwrap();
    assert_eq!(listed.len(), 3);
    let x = listed
      .iter()
      .find(|l| !l.is_matched())
      .expect("unmatched entry listed");
    assert_eq!(x.name(), Some("Pharmacie X"));
  }

  #[tokio::test]
  async fn other_dates_are_ignored() {
    let finder = scenario().await;
    let found = finder
      .find_nearby_on_duty(
        &NearbyQuery::new(3.8480, 11.5021)
          .radius(500_000.0)
          .on(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()),
      )
      .await
      .unwrap();
    assert!(found.is_empty());
  }

  #[tokio::test]
  async fn invalid_inputs_are_validation_errors() {
    let finder = scenario().await;
    for query in [
      NearbyQuery::new(91.0, 11.5),
      NearbyQuery::new(3.8, -181.0),
      NearbyQuery::new(3.8, 11.5).radius(-5.0),
    ] {
      let err = finder.find_nearby_on_duty(&query).await.unwrap_err();
      assert!(err.is_validation(), "{err}");
    }
  }

  #[tokio::test]
  async fn store_failure_is_transient() {
    let store = MemoryStore { fault: Some(Fault::Offline), ..MemoryStore::default() };
    let finder = DutyFinder::new(Arc::new(store), QueryConfig::default());
    let err = finder
      .find_nearby_on_duty(&NearbyQuery::new(3.8480, 11.5021))
      .await
      .unwrap_err();
    assert!(err.is_transient());
    assert!(finder.health().await.is_err());
  }

  #[tokio::test]
  async fn unreadable_rows_are_not_transient() {
    let store = MemoryStore { fault: Some(Fault::BadRow), ..MemoryStore::default() };
    let finder = DutyFinder::new(Arc::new(store), QueryConfig::default());
    let err = finder
      .nearby_with_fallback(&NearbyQuery::new(3.8480, 11.5021))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)), "{err}");
    assert!(!err.is_transient());
    assert!(!err.is_validation());
  }

  #[tokio::test]
  async fn blank_city_lists_every_entry() {
    let finder = scenario().await;
    let all = finder.list_on_duty(Some(june_first()), None).await.unwrap();
    for blank in ["", "   "] {
      let listed = finder.list_on_duty(Some(june_first()), Some(blank)).await.unwrap();
      assert_eq!(listed, all);
    }
    let pharmacies = finder.list_pharmacies(Some(" "), None).await.unwrap();
    assert_eq!(pharmacies.len(), 2);
  }

  #[tokio::test]
  async fn fallback_appends_unmatched_entries_of_the_inferred_city() {
    let finder = scenario().await;
    let report = finder
      .nearby_with_fallback(&NearbyQuery::new(3.85, 11.50).on(june_first()))
      .await
      .unwrap();
    assert_eq!(report.inferred_city.as_deref(), Some("Yaoundé"));
    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.unmatched[0].name(), Some("Pharmacie X"));

    // Near Douala the inferred city differs, so X is not offered.
    let report = finder
      .nearby_with_fallback(&NearbyQuery::new(4.05, 9.70).on(june_first()))
      .await
      .unwrap();
    assert_eq!(report.inferred_city.as_deref(), Some("Douala"));
    assert!(report.unmatched.is_empty());
  }

  #[tokio::test]
  async fn no_city_is_inferred_far_from_every_pharmacy() {
    let finder = scenario().await;
    let city = finder
      .infer_city(GeoPoint::new(10.59, 14.31).unwrap())
      .await
      .unwrap();
    assert!(city.is_none());
  }

  #[tokio::test]
  async fn search_ignores_duty_status_and_applies_limit() {
    let store = MemoryStore::default();
    for i in 0..5 {
      add(&store, &format!("P{i}"), None, Some((3.8480 + f64::from(i) * 0.001, 11.5021))).await;
    }
    let finder = DutyFinder::new(Arc::new(store), QueryConfig::default());
    let found = finder
      .search_nearby(&SearchQuery {
        latitude:  3.8480,
        longitude: 11.5021,
        radius_m:  None,
        limit:     Some(3),
      })
      .await
      .unwrap();
    let names: Vec<&str> = found.iter().map(|f| f.pharmacy.name.as_str()).collect();
    assert_eq!(names, vec!["P0", "P1", "P2"]);
  }
}
