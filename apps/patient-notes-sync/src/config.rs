//! Configuration management for the patient notes group server and clients

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub groups: GroupPolicy,
    pub sync: SyncConfig,
    pub local: LocalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit; payloads embed attachments
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Server-side write policy for groups
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupPolicy {
    /// Reject pushes that omit `baseVersion` instead of letting them overwrite
    pub require_base_version: bool,
}

/// Where and how `SyncClient` reaches the group API
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub api_url: String,
    /// Deadline per request; `None` waits indefinitely
    pub timeout_secs: Option<u64>,
}

/// Location of the file-backed local store
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

const DEFAULT_PORT: u16 = 8787;
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            },
            database: DatabaseConfig {
                url: "sqlite:./groups.db".to_string(),
            },
            groups: GroupPolicy::default(),
            sync: SyncConfig::default(),
            local: LocalConfig {
                data_dir: PathBuf::from("./data"),
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            api_url: format!("http://localhost:{}", DEFAULT_PORT),
            timeout_secs: None,
        }
    }
}

fn parsed<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        _ => Ok(None),
    }
}

fn flag(var: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { var, value }),
        },
        Err(_) => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parsed("SERVER_PORT")?.unwrap_or(defaults.server.port),
                max_payload_bytes: parsed("MAX_PAYLOAD_BYTES")?
                    .unwrap_or(defaults.server.max_payload_bytes),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            groups: GroupPolicy {
                require_base_version: flag("REQUIRE_BASE_VERSION")?.unwrap_or(false),
            },
            sync: SyncConfig {
                api_url: env::var("GROUP_API_URL").unwrap_or(defaults.sync.api_url),
                timeout_secs: parsed("GROUP_API_TIMEOUT_SECS")?,
            },
            local: LocalConfig {
                data_dir: env::var("NOTES_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.local.data_dir),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.sync.api_url, "http://localhost:8787");
        assert!(config.sync.timeout_secs.is_none());
        assert!(!config.groups.require_base_version);
    }

    // Environment variables are process-wide, so everything that touches them
    // lives in this one test.
    #[test]
    fn test_from_env() {
        env::set_var("SERVER_PORT", "9100");
        env::set_var("REQUIRE_BASE_VERSION", "true");
        env::set_var("GROUP_API_TIMEOUT_SECS", "15");
        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 9100);
        assert!(config.groups.require_base_version);
        assert_eq!(config.sync.timeout_secs, Some(15));

        env::set_var("SERVER_PORT", "not-a-port");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { var: "SERVER_PORT", .. })
        ));

        env::set_var("SERVER_PORT", "9100");
        env::set_var("REQUIRE_BASE_VERSION", "maybe");
        assert!(Config::from_env().is_err());

        env::remove_var("SERVER_PORT");
        env::remove_var("REQUIRE_BASE_VERSION");
        env::remove_var("GROUP_API_TIMEOUT_SECS");
    }
}
