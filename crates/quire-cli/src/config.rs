//! CLI configuration via environment variables
//!
//! Build settings live in quire.toml; the environment only controls how the
//! binary itself reports.

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Log filter directive (QUIRE_LOG=debug)
    pub log_filter: Option<String>,
    /// Disable colored output (QUIRE_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let no_color = env::var("QUIRE_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok();
        if no_color {
            colored::control::set_override(false);
        }

        Self {
            log_filter: env::var("QUIRE_LOG")
                .ok()
                .filter(|filter| !filter.trim().is_empty()),
            no_color,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Log level when QUIRE_LOG is unset
pub fn default_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}
