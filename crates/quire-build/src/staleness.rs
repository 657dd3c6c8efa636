//! Modification-time staleness checks
//!
//! An artifact is stale when it is missing or when any path in its
//! dependency set was modified at or after the artifact itself. Ties count
//! as stale. Dependencies that do not exist are ignored.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Paths whose modification forces regeneration of an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    files: Vec<PathBuf>,
    trees: Vec<PathBuf>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single file
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Add a directory; every file beneath it counts
    pub fn with_tree(mut self, path: impl Into<PathBuf>) -> Self {
        self.trees.push(path.into());
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn trees(&self) -> &[PathBuf] {
        &self.trees
    }

    /// Most recently modified dependency that exists
    ///
    /// Missing dependencies are skipped. Any other metadata error is
    /// returned so the caller can treat the artifact as stale.
    pub fn newest(&self) -> io::Result<Option<(PathBuf, SystemTime)>> {
        let mut newest: Option<(PathBuf, SystemTime)> = None;
        let mut consider = |path: &Path, time: SystemTime| match &newest {
            Some((_, current)) if *current >= time => {}
            _ => newest = Some((path.to_path_buf(), time)),
        };

        for file in &self.files {
            if let Some(time) = modified_if_exists(file)? {
                consider(file, time);
            }
        }

        for tree in &self.trees {
            if !tree.exists() {
                continue;
            }
            // Directories count too: adding or removing an asset bumps its parent.
            for entry in WalkDir::new(tree).follow_links(true) {
                let entry = entry.map_err(io::Error::from)?;
                let time = entry.metadata().map_err(io::Error::from)?.modified()?;
                consider(entry.path(), time);
            }
        }

        Ok(newest)
    }
}

/// Why an artifact does or does not need regeneration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Staleness {
    /// Artifact is newer than every dependency
    UpToDate,
    /// Artifact does not exist
    Missing,
    /// A dependency was modified at or after the artifact
    DependencyNewer { dependency: PathBuf },
    /// Timestamps could not be read
    Unreadable { reason: String },
}

impl Staleness {
    /// Whether the artifact must be regenerated
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }

    /// Short description for status output
    pub fn describe(&self) -> String {
        match self {
            Self::UpToDate => "up to date".to_string(),
            Self::Missing => "missing".to_string(),
            Self::DependencyNewer { dependency } => {
                format!("{} changed", dependency.display())
            }
            Self::Unreadable { reason } => format!("unreadable timestamps: {}", reason),
        }
    }
}

/// Evaluate an artifact against its dependency set
pub fn check(artifact: &Path, dependencies: &DependencySet) -> Staleness {
    let artifact_time = match modified_if_exists(artifact) {
        Ok(Some(time)) => time,
        Ok(None) => return Staleness::Missing,
        Err(e) => {
            return Staleness::Unreadable {
                reason: e.to_string(),
            }
        }
    };

    match dependencies.newest() {
        Ok(Some((path, time))) if time >= artifact_time => {
            Staleness::DependencyNewer { dependency: path }
        }
        Ok(_) => Staleness::UpToDate,
        Err(e) => Staleness::Unreadable {
            reason: e.to_string(),
        },
    }
}

/// Whether an artifact must be regenerated
pub fn is_stale(artifact: &Path, dependencies: &DependencySet) -> bool {
    check(artifact, dependencies).is_stale()
}

fn modified_if_exists(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(metadata) => metadata.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
