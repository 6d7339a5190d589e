//! Configuration for the HCI socket workarounds.
//!
//! Settings are read from a TOML file; every field has a default so an
//! absent file or an empty table is a valid configuration.

use std::{env, fs, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default location of the Bluetooth debugfs tree
pub const DEFAULT_DEBUGFS_ROOT: &str = "/sys/kernel/debug/bluetooth";

/// Upper bound on the speculative shadow lifetime (one day)
pub const MAX_CONNECT_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Bounds on the reaper tick
pub const MIN_REAP_INTERVAL_MS: u64 = 10;
pub const MAX_REAP_INTERVAL_MS: u64 = 60 * 1000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// HCI device to bind; the first suitable device when absent
    #[serde(default)]
    pub dev_id: Option<u16>,

    /// Lifetime of a speculative shadow connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Tick of the reaper and the readiness wait
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,

    #[serde(default = "default_debugfs_root")]
    pub debugfs_root: PathBuf,
}

const fn default_connect_timeout() -> u64 {
    60
}

const fn default_reap_interval() -> u64 {
    1000
}

fn default_debugfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_DEBUGFS_ROOT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dev_id: None,
            connect_timeout_secs: default_connect_timeout(),
            reap_interval_ms: default_reap_interval(),
            debugfs_root: default_debugfs_root(),
        }
    }
}

impl Config {
    /// Loads the configuration file, or the defaults if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::from_toml_str(&fs::read_to_string(&path)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = env::var("HCISOCK_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_home)
        } else if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config")
        } else {
            return Err(ConfigError::NoConfigDir);
        };

        Ok(config_dir.join("hcisock").join("config.toml"))
    }

    /// Speculative shadow lifetime, capped at [`MAX_CONNECT_TIMEOUT_SECS`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.min(MAX_CONNECT_TIMEOUT_SECS))
    }

    /// Reaper tick, clamped to a sane range
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(
            self.reap_interval_ms
                .clamp(MIN_REAP_INTERVAL_MS, MAX_REAP_INTERVAL_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.reap_interval(), Duration::from_secs(1));
        assert_eq!(config.debugfs_root, PathBuf::from(DEFAULT_DEBUGFS_ROOT));
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_toml_str(
            r#"
            dev_id = 1
            connect_timeout_secs = 5
            debugfs_root = "/tmp/bt"
            "#,
        )
        .unwrap();

        assert_eq!(config.dev_id, Some(1));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.reap_interval_ms, 1000);
        assert_eq!(config.debugfs_root, PathBuf::from("/tmp/bt"));
    }

    #[test]
    fn test_out_of_range_durations_are_clamped() {
        let config = Config::from_toml_str(
            r#"
            connect_timeout_secs = 9223372036854775807
            reap_interval_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(
            config.connect_timeout(),
            Duration::from_secs(MAX_CONNECT_TIMEOUT_SECS)
        );
        assert_eq!(
            config.reap_interval(),
            Duration::from_millis(MIN_REAP_INTERVAL_MS)
        );

        let config = Config::from_toml_str(
            r#"
            reap_interval_ms = 9223372036854775807
            "#,
        )
        .unwrap();
        assert_eq!(
            config.reap_interval(),
            Duration::from_millis(MAX_REAP_INTERVAL_MS)
        );
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let result = Config::from_toml_str("connect_timeout_secs = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
