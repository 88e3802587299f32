//! Configuration loaded from `config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Looked up at `<config dir>/wrong-notes/config.toml` unless a path is given.

use crate::models::interval::SubDayMode;
use crate::models::scheduler::DEFAULT_GRADUATION_SCORE;
use crate::models::score::{MAX_SCORE, MIN_SCORE};
use crate::models::{Scheduler, ScoreThreshold};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "wrong-notes";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "wrong_notes.sqlite3";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    /// Sub-day stage a failed review falls back to.
    pub sub_day_mode: SubDayMode,
    /// Minimum score that graduates an item.
    pub graduation_threshold: u8,
    pub default_upcoming_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            sub_day_mode: SubDayMode::default(),
            graduation_threshold: DEFAULT_GRADUATION_SCORE,
            default_upcoming_limit: 10,
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join(DATABASE_FILE))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Loads `path` if given (it must exist), otherwise the default location
    /// if a file is there, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.graduation_threshold) {
            return Err(ConfigError::Invalid(format!(
                "graduation_threshold must be between {} and {}, got {}",
                MIN_SCORE, MAX_SCORE, self.graduation_threshold
            )));
        }
        Ok(())
    }

    pub fn scheduler(&self) -> Scheduler<ScoreThreshold> {
        Scheduler::with_policy(self.sub_day_mode, ScoreThreshold(self.graduation_threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.graduation_threshold, 4);
        assert_eq!(config.sub_day_mode, SubDayMode::Immediate);
        assert_eq!(config.default_upcoming_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sub_day_mode = \"same-day\"").unwrap();
        writeln!(file, "database_path = \"/tmp/notes.sqlite3\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.sub_day_mode, SubDayMode::SameDay);
        assert_eq!(config.database_path, PathBuf::from("/tmp/notes.sqlite3"));
        assert_eq!(config.graduation_threshold, 4);
        assert_eq!(config.scheduler().sub_day_mode(), SubDayMode::SameDay);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "graduation_threshold = 6").unwrap();

        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_bad_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "graduation_threshold = \"four\"").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Toml(_))
        ));
    }
}
