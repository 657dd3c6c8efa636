pub mod build;
pub mod goals;
pub mod init;
pub mod status;
pub mod watch;

use anyhow::{Context as _, Result};
use quire_build::{Config, ConfigLoader, Orchestrator};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flags shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub project_dir: PathBuf,
    pub json: bool,
    pub quiet: bool,
    pub jobs: Option<usize>,
}

impl Context {
    /// Absolute project directory, so derived paths are stable
    pub fn project_dir(&self) -> Result<PathBuf> {
        self.project_dir.canonicalize().with_context(|| {
            format!(
                "Project directory {} does not exist",
                self.project_dir.display()
            )
        })
    }

    /// Find and load quire.toml from the project directory upward
    pub fn load_config(&self) -> Result<Config> {
        let dir = self.project_dir()?;
        load_config_from(&dir)
    }

    /// Orchestrator for the loaded project, with CLI overrides applied
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let config = self.load_config()?;
        let orchestrator = Orchestrator::new(config).context("Invalid build configuration")?;
        Ok(self.apply_overrides(orchestrator))
    }

    /// `--jobs` turns on parallel mode
    pub fn apply_overrides(&self, orchestrator: Orchestrator) -> Orchestrator {
        match self.jobs {
            Some(jobs) => {
                debug!(jobs, "parallel mode from --jobs");
                orchestrator.with_parallel(true).with_jobs(Some(jobs))
            }
            None => orchestrator,
        }
    }
}

pub fn load_config_from(dir: &Path) -> Result<Config> {
    let config = ConfigLoader::new()
        .load_from_directory(dir)
        .with_context(|| format!("Failed to load quire.toml for {}", dir.display()))?;
    debug!(
        config = %config.config_path.display(),
        scratch = %config.scratch_dir().display(),
        "loaded configuration"
    );
    Ok(config)
}
