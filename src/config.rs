use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{DEFAULT_DATABASE_NAME, DEFAULT_TICK_INTERVAL_MS};

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// Journal configuration
    Journal,
}

/// Light/dark display preference, persisted as a plain string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Read a stored preference; anything other than "dark" means light
    pub fn from_stored(value: &str) -> Theme {
        if value.trim().eq_ignore_ascii_case("dark") {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

/// Journal configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    /// Configuration type (must be "journal")
    pub config_type: ConfigType,
    /// Directory holding the database and lock files (default: memories)
    pub data_dir: Option<PathBuf>,
    /// Database file stem, stored as <data_dir>/<name>.sqlite
    #[serde(default = "default_database_name")]
    pub database_name: String,
    /// Elapsed-time sampling interval while recording, in milliseconds (default: 200)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            config_type: ConfigType::Journal,
            data_dir: None,
            database_name: default_database_name(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl JournalConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: JournalConfig = toml::from_str(content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".to_string());
        }
        let name = self.database_name.trim();
        if name.is_empty() {
            return Err("database_name must not be empty".to_string());
        }
        if name.contains('/') || name.contains('\\') {
            return Err(format!(
                "database_name '{}' must be a plain file name",
                self.database_name
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("memories"))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir()
            .join(format!("{}.sqlite", self.database_name.trim()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let config = JournalConfig::from_toml_str("config_type = \"journal\"").unwrap();
        assert_eq!(config.database_name, DEFAULT_DATABASE_NAME);
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
        assert_eq!(
            config.database_path(),
            PathBuf::from("memories").join("life-memory-keeper.sqlite")
        );
    }

    #[test]
    fn explicit_values_are_read() {
        let config = JournalConfig::from_toml_str(
            r#"
config_type = "journal"
data_dir = "/var/journal"
database_name = "family"
tick_interval_ms = 500
"#,
        )
        .unwrap();
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/journal/family.sqlite")
        );
        assert_eq!(config.tick_interval_ms, 500);
    }

    #[test]
    fn config_type_is_required() {
        assert!(matches!(
            JournalConfig::from_toml_str("database_name = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_tick_interval_is_invalid() {
        let result =
            JournalConfig::from_toml_str("config_type = \"journal\"\ntick_interval_ms = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn database_name_cannot_be_a_path() {
        let result =
            JournalConfig::from_toml_str("config_type = \"journal\"\ndatabase_name = \"../x\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_theme_values_read_as_light() {
        assert_eq!(Theme::from_stored("dark"), Theme::Dark);
        assert_eq!(Theme::from_stored(" Dark "), Theme::Dark);
        assert_eq!(Theme::from_stored("light"), Theme::Light);
        assert_eq!(Theme::from_stored("purple"), Theme::Light);
    }
}
