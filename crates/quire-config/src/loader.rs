//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{normalize_path, ProjectConfig, WatchSection};
use crate::{ConfigError, ConfigResult, PROJECT_CONFIG_FILE};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watch interval used when neither project nor global config sets one
pub const DEFAULT_WATCH_INTERVAL_SECS: f64 = 2.0;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.quire/config.toml) - lowest priority
/// 2. Project config (./quire.toml) - overrides global
/// 3. Environment variables (QUIRE_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where quire.toml was found)
    pub project_root: PathBuf,

    /// Path of the quire.toml that was loaded
    pub config_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of ~/.quire/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find quire.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let config_path = Self::find_project_config(start_dir)
            .ok_or_else(|| ConfigError::ProjectNotFound(start_dir.to_path_buf()))?;
        self.load_from_file(&config_path)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = Self::apply_env_overrides(project_config)?;

        let project_root = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let config = Config {
            project: project_config,
            global: global_config,
            project_root,
            config_path: config_path.to_path_buf(),
        };
        config.validate_scratch()?;
        Ok(config)
    }

    /// Find quire.toml by walking up the directory tree
    pub fn find_project_config(start_dir: &Path) -> Option<PathBuf> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.is_file() {
                return Some(config_path);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return None,
            }
        }
    }

    /// Load global configuration from ~/.quire/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognized variables: QUIRE_SCRATCH_DIR, QUIRE_WATCH_INTERVAL,
    /// QUIRE_PARALLEL, QUIRE_JOBS
    fn apply_env_overrides(mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(scratch) = env::var("QUIRE_SCRATCH_DIR") {
            if !scratch.is_empty() {
                config.build.scratch_dir = PathBuf::from(scratch);
            }
        }

        if let Ok(interval) = env::var("QUIRE_WATCH_INTERVAL") {
            let interval_secs: f64 = interval.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "QUIRE_WATCH_INTERVAL".to_string(),
                reason: format!("'{}' is not a number", interval),
            })?;
            config.watch = Some(WatchSection { interval_secs });
        }

        if let Ok(parallel) = env::var("QUIRE_PARALLEL") {
            config.build.parallel =
                matches!(parallel.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Ok(jobs) = env::var("QUIRE_JOBS") {
            let jobs: usize = jobs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "QUIRE_JOBS".to_string(),
                reason: format!("'{}' is not a worker count", jobs),
            })?;
            config.build.jobs = Some(jobs);
            config.build.parallel = true;
        }

        // Overrides are validated like the file itself
        config.validate()?;
        Ok(config)
    }

    /// Get the global configuration directory (~/.quire)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".quire"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Build a config from an in-memory project configuration
    pub fn from_project(project: ProjectConfig, project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            project,
            global: GlobalConfig::default(),
            config_path: project_root.join(PROJECT_CONFIG_FILE),
            project_root,
        }
    }

    /// Get the project root directory
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Absolute scratch directory, with `.` and `..` resolved
    pub fn scratch_dir(&self) -> PathBuf {
        normalize_path(&self.resolve(&self.project.build.scratch_dir))
    }

    /// Reject a scratch directory that is the project root or one of its ancestors
    ///
    /// Purging such a directory would delete sources and quire.toml.
    pub fn validate_scratch(&self) -> ConfigResult<()> {
        let scratch = self.scratch_dir();
        if normalize_path(&self.project_root).starts_with(&scratch) {
            return Err(ConfigError::InvalidValue {
                field: "build.scratch_dir".to_string(),
                reason: format!(
                    "{} is or contains the project root",
                    scratch.display()
                ),
            });
        }
        Ok(())
    }

    /// Absolute auxiliary asset directory, if configured
    pub fn aux_dir(&self) -> Option<PathBuf> {
        self.project
            .sources
            .aux_dir
            .as_deref()
            .map(|dir| self.resolve(dir))
    }

    /// Absolute cache paths removed by `clean --all`
    pub fn cache_paths(&self) -> Vec<PathBuf> {
        self.project
            .clean
            .caches
            .iter()
            .map(|path| self.resolve(path))
            .collect()
    }

    /// Effective watch interval (project > global > default)
    pub fn watch_interval(&self) -> Duration {
        let secs = self
            .project
            .watch
            .as_ref()
            .map(|w| w.interval_secs)
            .or_else(|| self.global.default_watch_interval())
            .unwrap_or(DEFAULT_WATCH_INTERVAL_SECS);
        Duration::from_secs_f64(secs)
    }

    /// Whether stage units run concurrently
    pub fn parallel(&self) -> bool {
        self.project.build.parallel
    }

    /// Effective worker count (project > global), if configured
    pub fn jobs(&self) -> Option<usize> {
        self.project.build.jobs.or_else(|| self.global.default_jobs())
    }

    /// Resolve a program name through the global `[tools]` overrides
    pub fn program(&self, name: &str) -> PathBuf {
        self.global
            .tool_path(name)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(name))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[profiles.notes]
intermediate = "html"
"#;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn loader(temp_dir: &TempDir) -> ConfigLoader {
        ConfigLoader::new().with_global_config_path(temp_dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);

        let config = loader(&temp_dir)
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.project.profile_names(), vec!["notes"]);
        assert_eq!(config.project_root(), temp_dir.path());
        assert_eq!(config.scratch_dir(), temp_dir.path().join(".quire/scratch"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);

        let sub_dir = temp_dir.path().join("chapters");
        fs::create_dir(&sub_dir).unwrap();

        let config = loader(&temp_dir).load_from_directory(&sub_dir).unwrap();
        assert_eq!(config.project_root(), temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_no_project_config() {
        let temp_dir = TempDir::new().unwrap();

        let result = loader(&temp_dir).load_from_directory(temp_dir.path());
        assert!(matches!(result, Err(ConfigError::ProjectNotFound(_))));
    }

    #[test]
    #[serial]
    fn test_env_override_scratch_dir() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);

        env::set_var("QUIRE_SCRATCH_DIR", "build/tmp");
        let config = loader(&temp_dir).load_from_directory(temp_dir.path());
        env::remove_var("QUIRE_SCRATCH_DIR");

        assert_eq!(
            config.unwrap().scratch_dir(),
            temp_dir.path().join("build/tmp")
        );
    }

    #[test]
    #[serial]
    fn test_env_override_watch_interval() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);

        env::set_var("QUIRE_WATCH_INTERVAL", "0.25");
        let config = loader(&temp_dir).load_from_directory(temp_dir.path());
        env::remove_var("QUIRE_WATCH_INTERVAL");

        assert_eq!(config.unwrap().watch_interval(), Duration::from_millis(250));
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_interval() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);

        env::set_var("QUIRE_WATCH_INTERVAL", "soon");
        let result = loader(&temp_dir).load_from_directory(temp_dir.path());
        env::remove_var("QUIRE_WATCH_INTERVAL");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn test_env_jobs_enables_parallel() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);

        env::set_var("QUIRE_JOBS", "3");
        let config = loader(&temp_dir).load_from_directory(temp_dir.path());
        env::remove_var("QUIRE_JOBS");

        let config = config.unwrap();
        assert!(config.parallel());
        assert_eq!(config.jobs(), Some(3));
    }

    #[test]
    #[serial]
    fn test_absolute_scratch_at_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);
        let parent = temp_dir.path().parent().unwrap().to_path_buf();

        for scratch in [temp_dir.path().to_path_buf(), parent] {
            env::set_var("QUIRE_SCRATCH_DIR", &scratch);
            let result = loader(&temp_dir).load_from_directory(temp_dir.path());
            env::remove_var("QUIRE_SCRATCH_DIR");

            assert!(
                matches!(result, Err(ConfigError::InvalidValue { ref field, .. }) if field == "build.scratch_dir"),
                "{} accepted",
                scratch.display()
            );
        }
    }

    #[test]
    fn test_scratch_dir_is_normalized() {
        let mut project = ProjectConfig::parse(CONFIG).unwrap();
        project.build.scratch_dir = PathBuf::from("build/./tmp/../scratch");
        let config = Config::from_project(project, "/tmp/doc");

        assert_eq!(config.scratch_dir(), PathBuf::from("/tmp/doc/build/scratch"));
        assert!(config.validate_scratch().is_ok());
    }

    #[test]
    fn test_scratch_dir_climbing_to_root_is_rejected() {
        let mut project = ProjectConfig::parse(CONFIG).unwrap();
        project.build.scratch_dir = PathBuf::from("../doc");
        let config = Config::from_project(project, "/tmp/doc");

        assert!(config.validate_scratch().is_err());
    }

    #[test]
    fn test_default_watch_interval() {
        let config = Config::from_project(ProjectConfig::parse(CONFIG).unwrap(), "/tmp/doc");
        assert_eq!(
            config.watch_interval(),
            Duration::from_secs_f64(DEFAULT_WATCH_INTERVAL_SECS)
        );
    }

    #[test]
    #[serial]
    fn test_global_tool_override() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), CONFIG);
        let global_path = temp_dir.path().join("global.toml");
        fs::write(
            &global_path,
            "[tools]\npandoc = \"/opt/pandoc\"\n\n[defaults]\njobs = 3\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_global_config_path(&global_path)
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.program("pandoc"), PathBuf::from("/opt/pandoc"));
        assert_eq!(config.program("latexmk"), PathBuf::from("latexmk"));
        assert_eq!(config.jobs(), Some(3));
    }
}
