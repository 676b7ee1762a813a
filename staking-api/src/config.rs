//! Server configuration

use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DB_PATH: &str = "data/stakes.db";

/// Configuration for the API server
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Bearer token accepted on operator routes; `None` disables them
    pub operator_token: Option<String>,
    pub enforce_stake_bounds: bool,
}

impl ApiConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - SERVER_PORT (default 3001)
    /// - STAKES_DB_PATH (default data/stakes.db)
    /// - OPERATOR_TOKEN (optional)
    /// - ENFORCE_STAKE_BOUNDS (default true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("SERVER_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "SERVER_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let db_path = lookup("STAKES_DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let operator_token = lookup("OPERATOR_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let enforce_stake_bounds = match lookup("ENFORCE_STAKE_BOUNDS") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                field: "ENFORCE_STAKE_BOUNDS",
                value: raw,
            })?,
            None => true,
        };

        Ok(Self {
            port,
            db_path,
            operator_token,
            enforce_stake_bounds,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.db_path, PathBuf::from("data/stakes.db"));
        assert_eq!(config.operator_token, None);
        assert!(config.enforce_stake_bounds);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SERVER_PORT", "8080"),
            ("STAKES_DB_PATH", "/tmp/ledger.db"),
            ("OPERATOR_TOKEN", "s3cret"),
            ("ENFORCE_STAKE_BOUNDS", "off"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.operator_token.as_deref(), Some("s3cret"));
        assert!(!config.enforce_stake_bounds);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(
            load(&[("SERVER_PORT", "http")]),
            Err(ConfigError::Invalid { field: "SERVER_PORT", .. })
        ));
    }

    #[test]
    fn test_token_is_trimmed() {
        let config = load(&[("OPERATOR_TOKEN", "s3cret\n ")]).unwrap();
        assert_eq!(config.operator_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_blank_token_is_unset() {
        let config = load(&[("OPERATOR_TOKEN", "  ")]).unwrap();
        assert_eq!(config.operator_token, None);
    }
}
