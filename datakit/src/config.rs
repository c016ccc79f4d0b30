//! YAML configuration shared by the command-line tools.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intervals::DEFAULT_MAX_INTERVALS;
use crate::renamer::RenamerConfig;
use crate::timestamps::DEFAULT_TIME_FORMAT;

/// Errors that can occur while loading or saving a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Parameters of interval extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Background value of sequences and projections
    #[serde(default)]
    pub discard: f64,

    /// Cap for plain sequences
    #[serde(default = "default_max_intervals")]
    pub max_intervals: usize,

    /// Cap for row intervals of image projections
    #[serde(default = "default_max_h")]
    pub max_h: usize,

    /// Cap for column intervals of image projections
    #[serde(default = "default_max_v")]
    pub max_v: usize,
}

fn default_max_intervals() -> usize {
    DEFAULT_MAX_INTERVALS
}

fn default_max_h() -> usize {
    1
}

fn default_max_v() -> usize {
    3
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            discard: 0.0,
            max_intervals: default_max_intervals(),
            max_h: default_max_h(),
            max_v: default_max_v(),
        }
    }
}

/// Parsing of time strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// chrono format of time strings
    #[serde(default = "default_time_format")]
    pub format: String,
}

fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            format: default_time_format(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interval extraction parameters
    #[serde(default)]
    pub intervals: IntervalConfig,

    /// Time string parsing
    #[serde(default)]
    pub time: TimeConfig,

    /// Needed only by the `rename` command
    #[serde(default)]
    pub renamer: Option<RenamerConfig>,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not a valid configuration.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    /// [`ConfigError::Yaml`] on serialization failure, [`ConfigError::Io`]
    /// if the file cannot be written.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.intervals.max_intervals, 100);
        assert_eq!((config.intervals.max_h, config.intervals.max_v), (1, 3));
        assert_eq!(config.time.format, "%M:%S%.f");
        assert!(config.renamer.is_none());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("intervals:\n  max_v: 5\n").unwrap();
        assert_eq!(config.intervals.max_v, 5);
        assert_eq!(config.intervals.max_h, 1);
        assert_eq!(config.time, TimeConfig::default());
    }

    #[test]
    fn yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datakit.yaml");
        let mut config = Config::default();
        config.intervals.discard = 255.0;
        config.renamer = Some(RenamerConfig::new("in", "out", "log.csv"));
        config.to_yaml(&path).unwrap();
        assert_eq!(Config::from_yaml(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Config::from_yaml("/no/such/datakit.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
