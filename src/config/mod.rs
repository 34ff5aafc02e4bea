//! Configuration module for the AITC backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var} value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which storage engine backs the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Sqlite,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageKind::Sqlite),
            "memory" => Ok(StorageKind::Memory),
            _ => Err("expected 'sqlite' or 'memory'".to_string()),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Storage engine
    pub storage: StorageKind,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Keep fields outside a record's declared set instead of rejecting uploads
    pub ignore_unknown_fields: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_psk = lookup("AITC_API_PSK").filter(|psk| !psk.is_empty());

        let storage = parse_var(&lookup, "AITC_STORAGE", StorageKind::Sqlite)?;

        let db_path = lookup("AITC_DB_PATH")
            .unwrap_or_else(|| "./data/aitc.sqlite".to_string())
            .into();

        let bind_addr = parse_var(
            &lookup,
            "AITC_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        )?;

        let log_level = lookup("AITC_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let ignore_unknown_fields = match lookup("AITC_IGNORE_UNKNOWN_FIELDS") {
            Some(value) => parse_flag("AITC_IGNORE_UNKNOWN_FIELDS", &value)?,
            None => false,
        };

        Ok(Self {
            api_psk,
            storage,
            db_path,
            bind_addr,
            log_level,
            ignore_unknown_fields,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("./data/aitc.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.ignore_unknown_fields);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("AITC_API_PSK", "secret"),
            ("AITC_STORAGE", "Memory"),
            ("AITC_BIND_ADDR", "0.0.0.0:9000"),
            ("AITC_IGNORE_UNKNOWN_FIELDS", "yes"),
        ])
        .unwrap();

        assert_eq!(config.api_psk.as_deref(), Some("secret"));
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(config.ignore_unknown_fields);
    }

    #[test]
    fn test_empty_psk_disables_auth() {
        let config = config_from(&[("AITC_API_PSK", "")]).unwrap();
        assert!(config.api_psk.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = config_from(&[("AITC_BIND_ADDR", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains("AITC_BIND_ADDR"));

        assert!(config_from(&[("AITC_STORAGE", "postgres")]).is_err());
        assert!(config_from(&[("AITC_IGNORE_UNKNOWN_FIELDS", "maybe")]).is_err());
    }
}
