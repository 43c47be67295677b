//! Server configuration, layered from an optional TOML file and `GARDE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use garde_core::query::QueryConfig;
use garde_store_sqlite::StoreConfig;
use serde::Deserialize;

/// Top-level server configuration. Every field has a default, so an empty
/// (or missing) file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path:       PathBuf,
  /// Prepended to every table name; `[A-Za-z0-9_]` only.
  pub table_prefix:     String,
  pub default_radius_m: f64,
  /// Requested radii above this are clamped. Unset = no limit.
  pub max_radius_m:     Option<f64>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let query = QueryConfig::default();
    Self {
      host:             "127.0.0.1".to_string(),
      port:             5000,
      store_path:       PathBuf::from("pharmacies.db"),
      table_prefix:     String::new(),
      default_radius_m: query.default_radius_m,
      max_radius_m:     Some(50_000.0),
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and overlay the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("GARDE"))
      .build()?
      .try_deserialize()
  }

  pub fn query_config(&self) -> QueryConfig {
    QueryConfig {
      default_radius_m: self.default_radius_m,
      max_radius_m: self.max_radius_m,
      ..QueryConfig::default()
    }
  }

  pub fn store_config(&self) -> StoreConfig {
    StoreConfig { table_prefix: self.table_prefix.clone() }
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/garde.toml")).unwrap();
    assert_eq!(cfg.port, 5000);
    assert_eq!(cfg.default_radius_m, 5_000.0);
    assert_eq!(cfg.max_radius_m, Some(50_000.0));
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = std::env::temp_dir().join(format!("garde-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "port = 8080\ntable_prefix = \"pharmacy_\"\ndefault_radius_m = 2500.0").unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store_config().table_prefix, "pharmacy_");
    assert_eq!(cfg.query_config().default_radius_m, 2_500.0);
    assert_eq!(cfg.host, "127.0.0.1");

    std::fs::remove_dir_all(dir).ok();
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    let expanded = expand_tilde(Path::new("~/garde/pharmacies.db"));
    assert_eq!(expanded, PathBuf::from(home).join("garde/pharmacies.db"));
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}
