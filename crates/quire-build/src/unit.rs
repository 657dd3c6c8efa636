//! Units of work and the artifacts they produce

use crate::staleness::DependencySet;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One step of the two-step pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Markup to intermediate
    Convert,
    /// Intermediate to final
    Compile,
}

impl Stage {
    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::Compile => "compile",
        }
    }

    /// Both stages in pipeline order
    pub fn all() -> [Stage; 2] {
        [Self::Convert, Self::Compile]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A (source, profile, stage) combination, the granularity of failure isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Unit {
    /// Source document path relative to the project root
    pub source: PathBuf,
    /// Profile name
    pub profile: String,
    /// Pipeline stage
    pub stage: Stage,
}

impl Unit {
    pub fn new(source: impl Into<PathBuf>, profile: impl Into<String>, stage: Stage) -> Self {
        Self {
            source: source.into(),
            profile: profile.into(),
            stage,
        }
    }

    /// Filesystem-safe identifier, used to partition the scratch directory
    pub fn key(&self) -> String {
        let source: String = self
            .source
            .to_string_lossy()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        format!("{}.{}.{}", source, self.profile, self.stage)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.source.display(),
            self.profile,
            self.stage
        )
    }
}

/// An output the orchestrator owns, identified by the unit that produces it
#[derive(Debug, Clone)]
pub struct DerivedArtifact {
    /// Producing unit
    pub unit: Unit,
    /// Absolute target path
    pub path: PathBuf,
    /// Paths whose modification forces regeneration
    pub dependencies: DependencySet,
}

impl DerivedArtifact {
    pub fn new(unit: Unit, path: PathBuf, dependencies: DependencySet) -> Self {
        Self {
            unit,
            path,
            dependencies,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
