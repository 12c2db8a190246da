//! Configuration loading and parsing for tether.
//!
//! The config file lives at `~/.tether/config.toml` unless `TETHER_CONFIG`
//! points elsewhere. A missing file is not an error; every field has a default.
//!
//! ```toml
//! [bridge]
//! misuse_policy = "report"
//!
//! [scenarios]
//! timeout_ms = 15000
//! heart_delay_ms = 2000
//! fruit_interval_ms = 2000
//! actor_rounds = 10
//! group_size = 6
//!
//! [log]
//! filter = "tether=debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use tether_types::MisusePolicy;
use thiserror::Error;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "TETHER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TetherConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub scenarios: ScenarioConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct BridgeConfig {
    /// "panic" or "report". Defaults to panic in debug builds, report in release.
    #[serde(default)]
    pub misuse_policy: MisusePolicy,
}

/// Timings and sizes for the demo scenarios.
#[derive(Debug, Deserialize)]
pub struct ScenarioConfig {
    /// Caller-side bound on each scenario. The bridge itself never times out.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_heart_delay_ms")]
    pub heart_delay_ms: u64,
    #[serde(default = "default_fruit_interval_ms")]
    pub fruit_interval_ms: u64,
    #[serde(default = "default_actor_rounds")]
    pub actor_rounds: usize,
    #[serde(default = "default_group_size")]
    pub group_size: usize,
}

const fn default_timeout_ms() -> u64 {
    15_000
}

const fn default_heart_delay_ms() -> u64 {
    2_000
}

const fn default_fruit_interval_ms() -> u64 {
    2_000
}

const fn default_actor_rounds() -> usize {
    10
}

const fn default_group_size() -> usize {
    6
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            heart_delay_ms: default_heart_delay_ms(),
            fruit_interval_ms: default_fruit_interval_ms(),
            actor_rounds: default_actor_rounds(),
            group_size: default_group_size(),
        }
    }
}

impl ScenarioConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn heart_delay(&self) -> Duration {
        Duration::from_millis(self.heart_delay_ms)
    }

    #[must_use]
    pub const fn fruit_interval(&self) -> Duration {
        Duration::from_millis(self.fruit_interval_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl TetherConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

/// `TETHER_CONFIG` if set and non-empty, else `~/.tether/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    match env::var(CONFIG_PATH_ENV) {
        Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value)),
        _ => dirs::home_dir().map(|home| home.join(".tether").join("config.toml")),
    }
}
