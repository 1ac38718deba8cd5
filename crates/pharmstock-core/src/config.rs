//! Engine configuration and logging setup.
//!
//! Sources, lowest precedence first:
//! 1. Defaults in code
//! 2. Optional `pharmstock.toml` (or the file named by `PHARMSTOCK_CONFIG`)
//! 3. Environment variables with the `PHARMSTOCK_` prefix

use std::sync::Once;
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::db::{Database, DbResult};

/// Engine configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// SQLite file shared by all stations
    pub database_path: String,

    /// How long a writer waits for another station's lock
    pub busy_timeout_ms: u64,

    /// Roll back movements that leave unexplained negative stock
    pub strict_consistency: bool,

    /// `tracing` filter directive, e.g. `pharmstock_core=debug`
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: "pharmstock.db".to_string(),
            busy_timeout_ms: 5_000,
            strict_consistency: true,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("PHARMSTOCK_CONFIG").unwrap_or_else(|_| "pharmstock".into());
        Self::load_from(&file)
    }

    /// Load configuration from `file` (extension optional) and environment.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Config::builder()
            .set_default("database_path", defaults.database_path)?
            .set_default("busy_timeout_ms", defaults.busy_timeout_ms)?
            .set_default("strict_consistency", defaults.strict_consistency)?
            .set_default("log_filter", defaults.log_filter)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("PHARMSTOCK").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Open the configured database.
    pub fn open_database(&self) -> DbResult<Database> {
        Database::open_with_timeout(&self.database_path, self.busy_timeout())
    }
}

static TRACING: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG`, else `log_filter`.
///
/// Safe to call more than once; only the first call has an effect, and a
/// subscriber installed by the host application is left alone.
pub fn init_tracing(log_filter: &str) {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(log_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = EngineConfig::load_from("/nonexistent/pharmstock-test").unwrap();
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert!(config.strict_consistency);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "database_path = \"/srv/pharmacy.db\"").unwrap();
        writeln!(file, "strict_consistency = false").unwrap();
        drop(file);

        let config = EngineConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.database_path, "/srv/pharmacy.db");
        assert!(!config.strict_consistency);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing("debug");
        init_tracing("warn");
    }
}
