//! SQL schema for the pharmacy store.
//!
//! Every table, index and trigger name carries the configured prefix so
//! several isolated stores can share one database file. Executed once at
//! connection startup; idempotent thanks to `IF NOT EXISTS`.

/// Table names for one prefix.
#[derive(Debug, Clone)]
pub struct Tables {
  pub pharmacies: String,
  /// R*Tree over pharmacy points; row id = pharmacy id.
  pub locations:  String,
  pub duties:     String,
}

impl Tables {
  pub fn new(prefix: &str) -> Self {
    Self {
      pharmacies: format!("{prefix}pharmacies"),
      locations:  format!("{prefix}pharmacy_locations"),
      duties:     format!("{prefix}duty_records"),
    }
  }

  /// Full schema DDL for these tables.
  pub fn schema(&self) -> String {
    let Self { pharmacies, locations, duties } = self;
    format!(
      "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS {pharmacies} (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    name_key    TEXT NOT NULL,   -- lowercased, trimmed name
    address     TEXT,
    phone       TEXT,
    city        TEXT,
    city_key    TEXT,            -- lowercased, trimmed city
    region      TEXT,
    latitude    REAL CHECK (latitude  BETWEEN -90  AND 90),
    longitude   REAL CHECK (longitude BETWEEN -180 AND 180),
    provenance  TEXT NOT NULL DEFAULT 'manual'
                CHECK (provenance IN ('map_import', 'directory_import', 'manual')),
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at  TEXT NOT NULL,
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

CREATE INDEX IF NOT EXISTS {pharmacies}_city_idx ON {pharmacies}(city_key, name_key);

-- Point index. Kept in step with the pharmacy table by the triggers below;
-- pharmacies without a location have no entry.
CREATE VIRTUAL TABLE IF NOT EXISTS {locations} USING rtree(
    id, min_lat, max_lat, min_lon, max_lon
);

CREATE TRIGGER IF NOT EXISTS {locations}_insert
AFTER INSERT ON {pharmacies}
WHEN new.latitude IS NOT NULL
BEGIN
    INSERT INTO {locations}
    VALUES (new.id, new.latitude, new.latitude, new.longitude, new.longitude);
END;

CREATE TRIGGER IF NOT EXISTS {locations}_update
AFTER UPDATE OF latitude, longitude ON {pharmacies}
BEGIN
    DELETE FROM {locations} WHERE id = old.id;
    INSERT INTO {locations}
    SELECT new.id, new.latitude, new.latitude, new.longitude, new.longitude
    WHERE new.latitude IS NOT NULL;
END;

CREATE TRIGGER IF NOT EXISTS {locations}_delete
AFTER DELETE ON {pharmacies}
BEGIN
    DELETE FROM {locations} WHERE id = old.id;
END;

-- NULL pharmacy_id = unmatched scrape row. SQLite treats NULLs as distinct
-- in UNIQUE constraints, so only matched rows are limited to one per date.
CREATE TABLE IF NOT EXISTS {duties} (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    pharmacy_id      INTEGER REFERENCES {pharmacies}(id) ON DELETE CASCADE,
    duty_date        TEXT NOT NULL,   -- YYYY-MM-DD
    scraped_name     TEXT,
    scraped_quarter  TEXT,
    scraped_city     TEXT,
    scraped_city_key TEXT,
    UNIQUE (pharmacy_id, duty_date)
);

CREATE INDEX IF NOT EXISTS {duties}_date_idx ON {duties}(duty_date);

PRAGMA user_version = 1;
"
    )
  }
}

/// Prefixes are spliced into unquoted identifiers: `[A-Za-z0-9_]`, not
/// starting with a digit.
pub fn is_valid_prefix(prefix: &str) -> bool {
  !prefix.starts_with(|c: char| c.is_ascii_digit())
    && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefix_validation() {
    assert!(is_valid_prefix(""));
    assert!(is_valid_prefix("pharmacy_"));
    assert!(!is_valid_prefix("x; DROP TABLE y; --"));
    assert!(!is_valid_prefix("a.b"));
    assert!(!is_valid_prefix("2024_"));
  }

  #[test]
  fn schema_uses_prefixed_names() {
    let ddl = Tables::new("tenant_").schema();
    assert!(ddl.contains("CREATE TABLE IF NOT EXISTS tenant_pharmacies"));
    assert!(ddl.contains("REFERENCES tenant_pharmacies(id)"));
    assert!(ddl.contains("USING rtree"));
  }
}
