//! Engine configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                        | Default      |
//! |---------------------------------|--------------|
//! | `ROOST_DB_PATH`                 | `./roost.db` |
//! | `ROOST_DB_MAX_CONNECTIONS`      | `5`          |
//! | `ROOST_DB_MIN_CONNECTIONS`      | `1`          |
//! | `ROOST_DB_CONNECT_TIMEOUT_SECS` | `30`         |
//! | `ROOST_SCOPE_TIMEOUT_SECS`      | `30`         |
//! | `ROOST_RUN_MIGRATIONS`          | `true`       |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

/// Consistency engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool upper bound
    pub max_connections: u32,

    /// Connections kept alive
    pub min_connections: u32,

    /// How long to wait for a pooled connection
    pub connect_timeout: Duration,

    /// Upper bound on one operation's transaction scope, lock wait included
    pub scope_timeout: Duration,

    /// Apply embedded migrations on connect
    pub run_migrations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./roost.db"),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            scope_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// `load()` passes the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            database_path: lookup("ROOST_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "ROOST_DB_MAX_CONNECTIONS", defaults.max_connections)?,

            min_connections: parse_or(&lookup, "ROOST_DB_MIN_CONNECTIONS", defaults.min_connections)?,

            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ROOST_DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),

            scope_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ROOST_SCOPE_TIMEOUT_SECS",
                defaults.scope_timeout.as_secs(),
            )?),

            run_migrations: parse_or(&lookup, "ROOST_RUN_MIGRATIONS", defaults.run_migrations)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("ROOST_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.min_connections > config.max_connections {
            return Err(ConfigError::Inconsistent(
                "ROOST_DB_MIN_CONNECTIONS exceeds ROOST_DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        if config.scope_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("ROOST_SCOPE_TIMEOUT_SECS".to_string()));
        }

        Ok(config)
    }

    /// Pool settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .run_migrations(self.run_migrations)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.scope_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ROOST_DB_PATH", "/var/lib/roost/roost.db"),
            ("ROOST_DB_MAX_CONNECTIONS", "8"),
            ("ROOST_SCOPE_TIMEOUT_SECS", " 5 "),
            ("ROOST_RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/roost/roost.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.scope_timeout, Duration::from_secs(5));
        assert!(!config.run_migrations);

        let db = config.db_config();
        assert_eq!(db.max_connections, 8);
        assert!(!db.run_migrations);
    }

    #[test]
    fn test_invalid_values() {
        let err = EngineConfig::from_lookup(lookup(&[("ROOST_DB_MAX_CONNECTIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k) if k == "ROOST_DB_MAX_CONNECTIONS"));

        assert!(EngineConfig::from_lookup(lookup(&[("ROOST_SCOPE_TIMEOUT_SECS", "0")])).is_err());

        let err = EngineConfig::from_lookup(lookup(&[
            ("ROOST_DB_MAX_CONNECTIONS", "2"),
            ("ROOST_DB_MIN_CONNECTIONS", "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }
}
