//! Quire Configuration System
//!
//! Provides configuration management for quire document projects:
//! - Project configuration (quire.toml)
//! - Global user configuration (~/.quire/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.quire/config.toml)
//! 2. Project config (./quire.toml)
//! 3. Environment variables (QUIRE_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use quire_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// File name of the project configuration
pub const PROJECT_CONFIG_FILE: &str = "quire.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("No {PROJECT_CONFIG_FILE} found in {0} or any parent directory")]
    ProjectNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::{
    BuildSection, CleanSection, CompilerSection, ConverterSection, ProfileSection,
    normalize_path, ProjectConfig, SourcesSection, WatchSection,
};
