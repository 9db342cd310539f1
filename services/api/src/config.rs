//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use drive_track_core::Platform;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where documents are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    Postgres { database_url: String },
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: Storage,
    pub log_level: Level,
    pub platform: Platform,
    pub jwt_secret: Option<String>,
    pub auth_session_days: i64,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Storage Settings ---
        let storage = match lookup("STORAGE").as_deref().unwrap_or("postgres") {
            "memory" => Storage::Memory,
            "postgres" => Storage::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        // --- Load Auth Settings ---
        let platform = match lookup("CLIENT_PLATFORM") {
            Some(value) => value
                .parse::<Platform>()
                .map_err(|e| ConfigError::InvalidValue("CLIENT_PLATFORM".to_string(), e))?,
            None => Platform::Web,
        };

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty());
        if platform == Platform::Native && jwt_secret.is_none() {
            return Err(ConfigError::MissingVar("JWT_SECRET".to_string()));
        }

        let auth_session_days = match lookup("AUTH_SESSION_DAYS") {
            Some(days) => days
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "AUTH_SESSION_DAYS".to_string(),
                        format!("'{}' is not a positive number of days", days),
                    )
                })?,
            None => 30,
        };

        Ok(Self {
            bind_address,
            storage,
            log_level,
            platform,
            jwt_secret,
            auth_session_days,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/drive")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.platform, Platform::Web);
        assert_eq!(config.auth_session_days, 30);
        assert_eq!(config.log_level, Level::INFO);
        assert!(matches!(config.storage, Storage::Postgres { .. }));
    }

    #[test]
    fn postgres_requires_database_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn memory_storage_needs_no_url() {
        let config = load(&[("STORAGE", "memory")]).unwrap();
        assert_eq!(config.storage, Storage::Memory);
    }

    #[test]
    fn native_platform_requires_jwt_secret() {
        let missing = load(&[("STORAGE", "memory"), ("CLIENT_PLATFORM", "native")]);
        assert!(matches!(missing, Err(ConfigError::MissingVar(v)) if v == "JWT_SECRET"));

        let ok = load(&[
            ("STORAGE", "memory"),
            ("CLIENT_PLATFORM", "ios"),
            ("JWT_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(ok.platform, Platform::Native);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            load(&[("STORAGE", "memory"), ("RUST_LOG", "loud")]),
            Err(ConfigError::InvalidValue(v, _)) if v == "RUST_LOG"
        ));
        assert!(matches!(
            load(&[("STORAGE", "memory"), ("AUTH_SESSION_DAYS", "0")]),
            Err(ConfigError::InvalidValue(v, _)) if v == "AUTH_SESSION_DAYS"
        ));
        assert!(matches!(
            load(&[("STORAGE", "redis")]),
            Err(ConfigError::InvalidValue(v, _)) if v == "STORAGE"
        ));
    }
}
