//! User configuration loaded from TOML. Every key is optional; a missing file
//! yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::export::ExportNaming;
use crate::pagination::{DEFAULT_PAGE_SIZE, PAGE_SIZES};

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the default `~/.library-manager/library.sqlite`.
    pub database_path: Option<PathBuf>,
    /// Initial page size for both panels.
    pub page_size: usize,
    pub export_dir: PathBuf,
    pub export_naming: ExportNaming,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            export_dir: PathBuf::from("."),
            export_naming: ExportNaming::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` when given, otherwise `config.toml` inside `data_dir` if it
    /// exists, otherwise the defaults.
    pub fn discover(path: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let candidate = data_dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !PAGE_SIZES.contains(&self.page_size) {
            return Err(ConfigError::InvalidValue {
                field: "page_size",
                reason: format!("{} is not one of {:?}", self.page_size, PAGE_SIZES),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level",
                reason: "cannot be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.page_size, 100);
        assert_eq!(config.export_naming, ExportNaming::Timestamped);
    }

    #[test]
    fn parses_every_key() {
        let config = AppConfig::from_toml(
            r#"
            database_path = "/tmp/library.sqlite"
            page_size = 250
            export_dir = "exports"
            export_naming = "fixed"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/tmp/library.sqlite"))
        );
        assert_eq!(config.page_size, 250);
        assert_eq!(config.export_dir, PathBuf::from("exports"));
        assert_eq!(config.export_naming, ExportNaming::Fixed);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn rejects_unsupported_page_size() {
        let err = AppConfig::from_toml("page_size = 30").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "page_size",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            AppConfig::from_toml("page_size = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn discover_falls_back_to_defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::discover(None, dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());

        fs::write(dir.path().join("config.toml"), "page_size = 50").unwrap();
        let config = AppConfig::discover(None, dir.path()).unwrap();
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AppConfig::discover(Some(&missing), dir.path()),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
