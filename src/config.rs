//! Process configuration from environment variables.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::db::pool::DEFAULT_MAX_CONNECTIONS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file.
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Seed for reviewer draws. Unset means seeded from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("review-assignment.db"),
            host: "0.0.0.0".to_string(),
            port: 8080,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            rng_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let host = get("SERVER_HOST").unwrap_or(defaults.host);
        let port = parse_var(get("SERVER_PORT"), "SERVER_PORT", "port number")?
            .unwrap_or(defaults.port);
        let db_max_connections =
            parse_var(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", "number")?
                .unwrap_or(defaults.db_max_connections);
        let rng_seed = parse_var(get("REVIEWER_RNG_SEED"), "REVIEWER_RNG_SEED", "u64 seed")?;

        Ok(Config {
            database_path,
            host,
            port,
            db_max_connections,
            rng_seed,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value: v.clone(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_PATH", "/data/reviews.db"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9000"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("REVIEWER_RNG_SEED", "42"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data/reviews.db"));
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.db_max_connections, 12);
        assert_eq!(config.rng_seed, Some(42));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = Config::from_lookup(lookup(&[("SERVER_PORT", "  "), ("SERVER_HOST", "")]))
            .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("SERVER_PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "SERVER_PORT",
                expected: "port number",
                value: "eighty".to_string(),
            }
        );
    }
}
