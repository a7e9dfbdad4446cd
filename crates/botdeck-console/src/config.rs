//! Console configuration: TOML file under the user config dir, then CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use botdeck_client::TransportMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the bot manager (REST routes and `/ws/socket.io`).
    pub server_url: String,
    pub mode: TransportMode,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Log panel retention, in lines.
    pub log_capacity: usize,
    /// Show bot tokens as `<bot id>:********` instead of clear text.
    pub mask_tokens: bool,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Diagnostics file used while the console owns the terminal.
    pub log_file: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            mode: TransportMode::Push,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: 10,
            connect_timeout_secs: 10,
            log_capacity: DEFAULT_LOG_CAPACITY,
            mask_tokens: false,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ConsoleConfig {
    /// `<config dir>/botdeck/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("botdeck").join("config.toml"))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// `path` is `None`. A missing default file yields the defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be at least 1".into()));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::Invalid("log_capacity must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Configured log file, else `<cache dir>/botdeck/botdeck.log`.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("botdeck").join("botdeck.log")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ConsoleConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = ConsoleConfig::from_toml_str(
            r#"
server_url = "http://bots.internal:9000"
mode = "poll"
mask_tokens = true
"#,
        )
        .unwrap();
        assert_eq!(config.server_url, "http://bots.internal:9000");
        assert_eq!(config.mode, TransportMode::Poll);
        assert!(config.mask_tokens);
        assert_eq!(config.log_capacity, DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            ConsoleConfig::from_toml_str("poll_interval_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        assert!(matches!(
            ConsoleConfig::from_toml_str(r#"mode = "carrier-pigeon""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ConsoleConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_capacity = 50\npoll_interval_secs = 2\n").unwrap();
        let config = ConsoleConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_capacity, 50);
        assert_eq!(config.poll_interval_secs, 2);
    }
}
