//! Global Configuration (~/.quire/config.toml)
//!
//! Handles user-level configuration stored in `~/.quire/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.quire/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Program path overrides, keyed by the program name used in quire.toml
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, PathBuf>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Watch interval used when a project does not set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_interval_secs: Option<f64>,

    /// Worker count used when a project does not set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(defaults) = &self.defaults {
            if let Some(interval) = defaults.watch_interval_secs {
                if interval <= 0.0 || !interval.is_finite() {
                    return Err(ConfigError::InvalidValue {
                        field: "defaults.watch_interval_secs".to_string(),
                        reason: format!("must be a positive number, got {}", interval),
                    });
                }
            }
            if defaults.jobs == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "defaults.jobs".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        for (name, path) in &self.tools {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("tools.{}", name),
                    reason: "path cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the global config file path (~/.quire/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".quire").join("config.toml"))
    }

    /// Default watch interval, if configured
    pub fn default_watch_interval(&self) -> Option<f64> {
        self.defaults.as_ref().and_then(|d| d.watch_interval_secs)
    }

    /// Default worker count, if configured
    pub fn default_jobs(&self) -> Option<usize> {
        self.defaults.as_ref().and_then(|d| d.jobs)
    }

    /// Path override for a program, if configured
    pub fn tool_path(&self, program: &str) -> Option<&Path> {
        self.tools.get(program).map(PathBuf::as_path)
    }
}
