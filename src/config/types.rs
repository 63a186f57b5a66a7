//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::moderation::ModerationConfig;
use crate::ids::{Identity, SpaceId};

/// Environment variable overriding `bot.owner_id`.
pub const OWNER_ENV_VAR: &str = "MODGUARD_OWNER_ID";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{var} is not a valid identity: {0:?}", var = OWNER_ENV_VAR)]
    InvalidOwner(String),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity and reporting.
    #[serde(default)]
    pub bot: BotConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Grace windows and caching.
    #[serde(default)]
    pub moderation: ModerationConfig,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_owner_override(std::env::var(OWNER_ENV_VAR).ok())?;
        Ok(config)
    }

    fn apply_owner_override(&mut self, value: Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = value {
            let id = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidOwner(raw.clone()))?;
            self.bot.owner_id = Some(Identity(id));
        }
        Ok(())
    }
}

/// Bot identity configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    /// Identity with unrestricted administrative rank. Required.
    pub owner_id: Option<Identity>,
    /// Space receiving audit notices for administrative changes.
    pub log_space: Option<SpaceId>,
    /// Prometheus metrics HTTP port (0 or unset disables the endpoint).
    pub metrics_port: Option<u16>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "modguard.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.bot.owner_id.is_none());
        assert_eq!(config.database.path, "modguard.db");
        assert_eq!(config.moderation.default_delay_secs, 1800);
    }

    #[test]
    fn full_file_parses() {
        let toml = r#"
[bot]
owner_id = 42
log_space = -1001
metrics_port = 9090

[database]
path = "/var/lib/modguard/state.db"

[moderation]
default_delay_secs = 600
max_delay_secs = 3600
cache_exemptions = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bot.owner_id, Some(Identity(42)));
        assert_eq!(config.bot.log_space, Some(SpaceId(-1001)));
        assert_eq!(config.bot.metrics_port, Some(9090));
        assert_eq!(config.database.path, "/var/lib/modguard/state.db");
        assert_eq!(config.moderation.default_delay_secs, 600);
        assert_eq!(config.moderation.max_delay_secs, 3600);
        assert!(!config.moderation.cache_exemptions);
    }

    #[test]
    fn owner_override_replaces_file_value() {
        let mut config: Config = toml::from_str("[bot]\nowner_id = 1").unwrap();
        config.apply_owner_override(Some(" 77 ".into())).unwrap();
        assert_eq!(config.bot.owner_id, Some(Identity(77)));

        config.apply_owner_override(None).unwrap();
        assert_eq!(config.bot.owner_id, Some(Identity(77)));
    }

    #[test]
    fn malformed_owner_override_is_rejected() {
        let mut config: Config = toml::from_str("").unwrap();
        let err = config.apply_owner_override(Some("alice".into())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOwner(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modguard.toml");
        std::fs::write(&path, "[database]\npath = \":memory:\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, ":memory:");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
