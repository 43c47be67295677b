//! [`SqliteStore`]: the SQLite implementation of [`PharmacyStore`].

use std::{path::Path, sync::Arc};

use chrono::{NaiveDate, Utc};
use garde_core::{
  duty::{DutyEntry, DutyListing, DutyRecord, NewDuty},
  geo::{BoundingBox, GeoPoint},
  pharmacy::{NewPharmacy, Pharmacy, PharmacyId},
  query::fold_key,
  store::{DutyCandidate, NearbySnapshot, PharmacyStore},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{
    PHARMACY_COLUMNS, PHARMACY_WIDTH, RawCandidate, RawDuty, RawPharmacy, RawScraped,
    encode_date, encode_dt,
  },
  schema::{Tables, is_valid_prefix},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Per-store settings, fixed when the store is opened.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
  /// Prepended to every table name, e.g. `"pharmacy_"`. Lets several
  /// isolated stores share one database file.
  pub table_prefix: String,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A pharmacy store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  tables: Arc<Tables>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
    let tables = Self::tables(&config)?;
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, tables };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory(config: StoreConfig) -> Result<Self> {
    let tables = Self::tables(&config)?;
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, tables };
    store.init_schema().await?;
    Ok(store)
  }

  fn tables(config: &StoreConfig) -> Result<Arc<Tables>> {
    if !is_valid_prefix(&config.table_prefix) {
      return Err(Error::InvalidTablePrefix(config.table_prefix.clone()));
    }
    Ok(Arc::new(Tables::new(&config.table_prefix)))
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = self.tables.schema();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    tracing::debug!(pharmacies = %self.tables.pharmacies, "schema ready");
    Ok(())
  }

  /// Run `sql` once per longitude span of `area`. `sql` binds `?1..?4` to
  /// the box and `?5` to `extra` when given.
  fn query_spans<T>(
    conn: &rusqlite::Connection,
    sql: &str,
    area: &BoundingBox,
    extra: Option<&str>,
    read: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
  ) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut out = Vec::new();
    for span in &area.longitude_spans {
      let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(area.min_latitude),
        Box::new(area.max_latitude),
        Box::new(span.min),
        Box::new(span.max),
      ];
      if let Some(extra) = extra {
        params.push(Box::new(extra.to_owned()));
      }
      let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      out.extend(rows);
    }
    Ok(out)
  }

  /// [`Self::query_spans`] inside its own read transaction.
  async fn within_area<T>(
    &self,
    sql: String,
    area: BoundingBox,
    extra: Option<String>,
    read: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
  ) -> Result<Vec<T>>
  where
    T: Send + 'static,
  {
    let rows = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let rows = Self::query_spans(&tx, &sql, &area, extra.as_deref(), read)?;
        tx.commit()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  fn on_duty_sql(&self) -> String {
    let Tables { pharmacies, locations, duties } = self.tables.as_ref();
    format!(
      "SELECT {PHARMACY_COLUMNS}, d.scraped_name, d.scraped_quarter, d.scraped_city
       FROM {locations} r
       JOIN {pharmacies} p ON p.id = r.id
       JOIN {duties} d     ON d.pharmacy_id = p.id
       WHERE r.max_lat >= ?1 AND r.min_lat <= ?2
         AND r.max_lon >= ?3 AND r.min_lon <= ?4
         AND d.duty_date = ?5"
    )
  }

  fn pharmacies_sql(&self) -> String {
    let Tables { pharmacies, locations, .. } = self.tables.as_ref();
    format!(
      "SELECT {PHARMACY_COLUMNS}
       FROM {locations} r
       JOIN {pharmacies} p ON p.id = r.id
       WHERE r.max_lat >= ?1 AND r.min_lat <= ?2
         AND r.max_lon >= ?3 AND r.min_lon <= ?4"
    )
  }

  fn read_candidate(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCandidate> {
    Ok(RawCandidate {
      pharmacy: RawPharmacy::read(row, 0)?,
      scraped:  RawScraped::read(row, PHARMACY_WIDTH)?,
    })
  }

  fn read_pharmacy(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPharmacy> {
    RawPharmacy::read(row, 0)
  }

  /// Upsert or insert one duty entry; returns the row id.
  fn write_duty(
    conn: &rusqlite::Connection,
    duties: &str,
    date: &str,
    entry: &DutyEntry,
  ) -> rusqlite::Result<i64> {
    let scraped = entry.scraped();
    let city_key = scraped.city.as_deref().map(fold_key);
    let sql = match entry {
      DutyEntry::Matched { .. } => format!(
        "INSERT INTO {duties}
           (pharmacy_id, duty_date, scraped_name, scraped_quarter, scraped_city, scraped_city_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (pharmacy_id, duty_date) DO UPDATE SET
           scraped_name     = excluded.scraped_name,
           scraped_quarter  = excluded.scraped_quarter,
           scraped_city     = excluded.scraped_city,
           scraped_city_key = excluded.scraped_city_key
         RETURNING id"
      ),
      DutyEntry::Unmatched { .. } => format!(
        "INSERT INTO {duties}
           (pharmacy_id, duty_date, scraped_name, scraped_quarter, scraped_city, scraped_city_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id"
      ),
    };
    conn.query_row(
      &sql,
      rusqlite::params![
        entry.pharmacy_id().map(|id| id.0),
        date,
        scraped.name,
        scraped.quarter,
        scraped.city,
        city_key,
      ],
      |row| row.get(0),
    )
  }
}

// ─── PharmacyStore impl ──────────────────────────────────────────────────────

impl PharmacyStore for SqliteStore {
  type Error = Error;

  // ── Spatial reads ─────────────────────────────────────────────────────────

  async fn on_duty_within(
    &self,
    date: NaiveDate,
    area: BoundingBox,
  ) -> Result<Vec<DutyCandidate>> {
    let raws = self
      .within_area(self.on_duty_sql(), area, Some(encode_date(date)), Self::read_candidate)
      .await?;
    raws.into_iter().map(RawCandidate::into_candidate).collect()
  }

  async fn pharmacies_within(&self, area: BoundingBox) -> Result<Vec<Pharmacy>> {
    let raws = self
      .within_area(self.pharmacies_sql(), area, None, Self::read_pharmacy)
      .await?;
    raws.into_iter().map(RawPharmacy::into_pharmacy).collect()
  }

  async fn nearby_snapshot(
    &self,
    date: NaiveDate,
    duty_area: BoundingBox,
    city_area: BoundingBox,
  ) -> Result<NearbySnapshot> {
    let on_duty_sql = self.on_duty_sql();
    let pharmacies_sql = self.pharmacies_sql();
    let unmatched_sql = format!(
      "SELECT d.id, d.pharmacy_id, d.duty_date,
              d.scraped_name, d.scraped_quarter, d.scraped_city
       FROM {} d
       WHERE d.duty_date = ?1 AND d.pharmacy_id IS NULL",
      self.tables.duties
    );
    let date_str = encode_date(date);

    let (candidates, neighbours, unmatched) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let candidates = Self::query_spans(
          &tx,
          &on_duty_sql,
          &duty_area,
          Some(date_str.as_str()),
          Self::read_candidate,
        )?;
        let neighbours =
          Self::query_spans(&tx, &pharmacies_sql, &city_area, None, Self::read_pharmacy)?;
        let unmatched = {
          let mut stmt = tx.prepare(&unmatched_sql)?;
          stmt
            .query_map(rusqlite::params![date_str], |row| {
              Ok(RawDuty {
                duty_id:     row.get(0)?,
                pharmacy_id: row.get(1)?,
                duty_date:   row.get(2)?,
                scraped:     RawScraped::read(row, 3)?,
                pharmacy:    None,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((candidates, neighbours, unmatched))
      })
      .await?;

    Ok(NearbySnapshot {
      on_duty:    candidates
        .into_iter()
        .map(RawCandidate::into_candidate)
        .collect::<Result<_>>()?,
      neighbours: neighbours
        .into_iter()
        .map(RawPharmacy::into_pharmacy)
        .collect::<Result<_>>()?,
      unmatched:  unmatched.into_iter().map(RawDuty::into_listing).collect::<Result<_>>()?,
    })
  }

  // ── Plain reads ───────────────────────────────────────────────────────────

  async fn duty_listings(
    &self,
    date: NaiveDate,
    city: Option<String>,
  ) -> Result<Vec<DutyListing>> {
    let Tables { pharmacies, duties, .. } = self.tables.as_ref();
    let sql = format!(
      "SELECT d.id, d.pharmacy_id, d.duty_date,
              d.scraped_name, d.scraped_quarter, d.scraped_city,
              {PHARMACY_COLUMNS}
       FROM {duties} d
       LEFT JOIN {pharmacies} p ON p.id = d.pharmacy_id
       WHERE d.duty_date = ?1
         AND (?2 IS NULL OR COALESCE(p.city_key, d.scraped_city_key) = ?2)"
    );
    let date_str = encode_date(date);
    let city_key = city.as_deref().map(fold_key);

    let raws: Vec<RawDuty> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![date_str, city_key], |row| {
            let joined: Option<i64> = row.get(6)?;
            Ok(RawDuty {
              duty_id:     row.get(0)?,
              pharmacy_id: row.get(1)?,
              duty_date:   row.get(2)?,
              scraped:     RawScraped::read(row, 3)?,
              pharmacy:    joined.map(|_| RawPharmacy::read(row, 6)).transpose()?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDuty::into_listing).collect()
  }

  async fn list_pharmacies(
    &self,
    city: Option<String>,
    limit: usize,
  ) -> Result<Vec<Pharmacy>> {
    let pharmacies = &self.tables.pharmacies;
    let sql = format!(
      "SELECT {PHARMACY_COLUMNS}
       FROM {pharmacies} p
       WHERE ?1 IS NULL OR p.city_key = ?1
       ORDER BY p.city_key IS NULL, p.city_key, p.name_key, p.id
       LIMIT ?2"
    );
    let city_key = city.as_deref().map(fold_key);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawPharmacy> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![city_key, limit], |row| RawPharmacy::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPharmacy::into_pharmacy).collect()
  }

  async fn get_pharmacy(&self, id: PharmacyId) -> Result<Option<Pharmacy>> {
    let pharmacies = &self.tables.pharmacies;
    let sql = format!("SELECT {PHARMACY_COLUMNS} FROM {pharmacies} p WHERE p.id = ?1");

    let raw: Option<RawPharmacy> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id.0], |row| RawPharmacy::read(row, 0))
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPharmacy::into_pharmacy).transpose()
  }

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Import contract ───────────────────────────────────────────────────────

  async fn add_pharmacy(&self, input: NewPharmacy) -> Result<Pharmacy> {
    let pharmacies = &self.tables.pharmacies;
    let sql = format!(
      "INSERT INTO {pharmacies} (
         name, name_key, address, phone, city, city_key, region,
         latitude, longitude, provenance, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
       RETURNING id"
    );

    let now = Utc::now();
    let name_key = fold_key(&input.name);
    let city_key = input.city.as_deref().map(fold_key);
    let now_str = encode_dt(now);
    let row = input.clone();

    let id: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &sql,
          rusqlite::params![
            row.name,
            name_key,
            row.address,
            row.phone,
            row.city,
            city_key,
            row.region,
            row.location.map(|p| p.latitude()),
            row.location.map(|p| p.longitude()),
            row.provenance.as_str(),
            now_str,
          ],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(Pharmacy {
      id:         PharmacyId(id),
      name:       input.name,
      address:    input.address,
      phone:      input.phone,
      city:       input.city,
      region:     input.region,
      location:   input.location,
      provenance: input.provenance,
      created_at: now,
      updated_at: now,
    })
  }

  async fn relocate_pharmacy(
    &self,
    id: PharmacyId,
    location: Option<GeoPoint>,
  ) -> Result<Pharmacy> {
    let pharmacies = &self.tables.pharmacies;
    let sql = format!(
      "UPDATE {pharmacies} SET latitude = ?2, longitude = ?3, updated_at = ?4
       WHERE id = ?1"
    );
    let now_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &sql,
          rusqlite::params![
            id.0,
            location.map(|p| p.latitude()),
            location.map(|p| p.longitude()),
            now_str,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PharmacyNotFound(id));
    }
    self.get_pharmacy(id).await?.ok_or(Error::PharmacyNotFound(id))
  }

  async fn delete_pharmacy(&self, id: PharmacyId) -> Result<bool> {
    let pharmacies = &self.tables.pharmacies;
    let sql = format!("DELETE FROM {pharmacies} WHERE id = ?1");

    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![id.0])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn record_duty(&self, input: NewDuty) -> Result<DutyRecord> {
    let duties = self.tables.duties.clone();
    let date_str = encode_date(input.date);
    let entry = input.entry.clone();

    let duty_id = self
      .conn
      .call(move |conn| Ok(Self::write_duty(conn, &duties, &date_str, &entry)?))
      .await?;

    Ok(DutyRecord {
      duty_id: garde_core::duty::DutyId(duty_id),
      date:    input.date,
      entry:   input.entry,
    })
  }

  async fn replace_duty_roster(
    &self,
    date: NaiveDate,
    entries: Vec<DutyEntry>,
  ) -> Result<usize> {
    let duties = self.tables.duties.clone();
    let date_str = encode_date(date);
    let count = entries.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          &format!("DELETE FROM {duties} WHERE duty_date = ?1 AND pharmacy_id IS NULL"),
          rusqlite::params![date_str],
        )?;
        for entry in &entries {
          Self::write_duty(&tx, &duties, &date_str, entry)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(%date, entries = count, "duty roster replaced");
    Ok(count)
  }

  async fn purge_duties_before(&self, date: NaiveDate) -> Result<u64> {
    let duties = &self.tables.duties;
    let sql = format!("DELETE FROM {duties} WHERE duty_date < ?1");
    let date_str = encode_date(date);

    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![date_str])?))
      .await?;

    tracing::info!(before = %date, deleted, "purged duty records");
    Ok(deleted as u64)
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Raw row count of the spatial index, for asserting trigger upkeep.
  pub(crate) async fn indexed_locations(&self) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", self.tables.locations);
    Ok(self.conn.call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?)).await?)
  }

  /// Execute a statement behind the store's back, to plant rows it would
  /// never write itself.
  pub(crate) async fn execute_raw(&self, sql: String) -> Result<usize> {
    Ok(self.conn.call(move |conn| Ok(conn.execute(&sql, [])?)).await?)
  }
}
