//! Runtime configuration
//!
//! Read from an optional TOML file; every field has a default so an empty or
//! missing file is valid. The CLI overrides individual fields after loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::SplitConfig;
use crate::error::{Error, Result};
use crate::lifecycle::DEFAULT_PAPER_SIZE;
use crate::model::GUARDIANS_PER_ITEM;
use crate::notify::Dispatcher;
use crate::timegate::TimeGate;

pub const CONFIG_FILE_NAME: &str = "paperlock.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// JSON file holding the roster, item pool and events
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Directory notices are written to
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
    #[serde(default = "default_decode_window_minutes")]
    pub decode_window_minutes: u32,
    /// Items drawn for each exam
    #[serde(default = "default_paper_size")]
    pub paper_size: usize,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_total_shares")]
    pub total_shares: u8,
    /// Delivery attempts per notice
    #[serde(default = "default_notify_attempts")]
    pub notify_attempts: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("paperlock-state.json")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

fn default_decode_window_minutes() -> u32 {
    TimeGate::DEFAULT_WINDOW_MINUTES
}

fn default_paper_size() -> usize {
    DEFAULT_PAPER_SIZE
}

fn default_threshold() -> u8 {
    2
}

fn default_total_shares() -> u8 {
    3
}

fn default_notify_attempts() -> u32 {
    Dispatcher::DEFAULT_ATTEMPTS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            outbox_dir: default_outbox_dir(),
            decode_window_minutes: default_decode_window_minutes(),
            paper_size: default_paper_size(),
            threshold: default_threshold(),
            total_shares: default_total_shares(),
            notify_attempts: default_notify_attempts(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads `path`, or the defaults when no path is given
    ///
    /// # Errors
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Toml`] if it is not valid TOML for this shape
    /// - [`Error::Validation`] if the values are inconsistent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::from_toml(&fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`Error::Toml`] on malformed input
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// # Errors
    /// Returns [`Error::Validation`] describing the first bad value
    pub fn validate(&self) -> Result<()> {
        self.split_config()?;
        if usize::from(self.total_shares) != GUARDIANS_PER_ITEM {
            return Err(Error::validation(format!(
                "total_shares must be {GUARDIANS_PER_ITEM}, one per guardian of an item"
            )));
        }
        if self.paper_size == 0 {
            return Err(Error::validation("paper_size must be at least 1"));
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`Error::Validation`] if threshold and share count do not form a valid split
    pub fn split_config(&self) -> Result<SplitConfig> {
        SplitConfig::from_raw(self.threshold, self.total_shares)
    }

    #[must_use]
    pub fn time_gate(&self) -> TimeGate {
        TimeGate::new(self.decode_window_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.paper_size, 25);
        assert_eq!(config.decode_window_minutes, 5);
        assert_eq!(config.time_gate(), TimeGate::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config = Config::from_toml(
            r#"
            decode_window_minutes = 10
            state_path = "/var/lib/paperlock/state.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.decode_window_minutes, 10);
        assert_eq!(config.state_path, PathBuf::from("/var/lib/paperlock/state.json"));
        assert_eq!(config.threshold, 2);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(matches!(
            Config::from_toml("windw = 3"),
            Err(Error::Toml(_))
        ));

        let config = Config {
            threshold: 4,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        let config = Config {
            total_shares: 5,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "paper_size = 10\nthreshold = 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.paper_size, 10);
        assert_eq!(*config.split_config().unwrap().threshold(), 3);
    }
}
