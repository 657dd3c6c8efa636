/// Build system error types
use crate::unit::Unit;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Source discovery failed for pattern '{pattern}': {error}")]
    Discovery { pattern: String, error: String },

    #[error("Naming collision: {first} and {second} both produce {}", path.display())]
    NamingCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Circular goal dependency detected: {0}")]
    CircularGoal(String),

    #[error("Goal not found: {goal}")]
    UnknownGoal { goal: String },

    #[error("Profile not found: {profile}")]
    UnknownProfile { profile: String },

    #[error("Configuration error: {0}")]
    Config(#[from] quire_config::ConfigError),

    #[error("I/O error at {}: {error}", path.display())]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error(
        "Refusing to purge scratch directory {}: it contains {}",
        path.display(),
        protected.display()
    )]
    UnsafeScratch { path: PathBuf, protected: PathBuf },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a discovery error
    pub fn discovery(pattern: impl Into<String>, error: impl ToString) -> Self {
        Self::Discovery {
            pattern: pattern.into(),
            error: error.to_string(),
        }
    }

    /// Create a naming collision error
    pub fn collision(path: impl Into<PathBuf>, first: &Unit, second: &Unit) -> Self {
        Self::NamingCollision {
            path: path.into(),
            first: first.to_string(),
            second: second.to_string(),
        }
    }
}

/// A failure confined to a single unit of work
///
/// Stage errors never abort a batch: the orchestrator hands them to the
/// failure reporter and moves on to the next unit.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("conversion failed for {unit}: {reason}")]
    Conversion {
        unit: Unit,
        reason: String,
        output: String,
    },

    #[error("compilation failed for {unit}: {reason}")]
    Compile {
        unit: Unit,
        reason: String,
        output: String,
    },

    #[error("relocation failed for {unit}: {reason}")]
    Relocation {
        unit: Unit,
        reason: String,
        output: String,
    },
}

impl StageError {
    /// Create a conversion error
    pub fn conversion(unit: Unit, reason: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Conversion {
            unit,
            reason: reason.into(),
            output: output.into(),
        }
    }

    /// Create a compiler error
    pub fn compile(unit: Unit, reason: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Compile {
            unit,
            reason: reason.into(),
            output: output.into(),
        }
    }

    /// Create a relocation error
    pub fn relocation(unit: Unit, reason: impl Into<String>) -> Self {
        Self::Relocation {
            unit,
            reason: reason.into(),
            output: String::new(),
        }
    }

    /// The unit that failed
    pub fn unit(&self) -> &Unit {
        match self {
            Self::Conversion { unit, .. }
            | Self::Compile { unit, .. }
            | Self::Relocation { unit, .. } => unit,
        }
    }

    /// Short description of what went wrong
    pub fn reason(&self) -> &str {
        match self {
            Self::Conversion { reason, .. }
            | Self::Compile { reason, .. }
            | Self::Relocation { reason, .. } => reason,
        }
    }

    /// Raw diagnostic output captured from the external tool
    pub fn output(&self) -> &str {
        match self {
            Self::Conversion { output, .. }
            | Self::Compile { output, .. }
            | Self::Relocation { output, .. } => output,
        }
    }

    /// Stable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conversion { .. } => "conversion",
            Self::Compile { .. } => "compile",
            Self::Relocation { .. } => "relocation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Stage;

    #[test]
    fn test_collision_message_names_both_units() {
        let first = Unit::new("talk.md", "slides", Stage::Compile);
        let second = Unit::new("talk.md", "handout", Stage::Compile);
        let err = BuildError::collision("talk.pdf", &first, &second);
        assert_eq!(
            err.to_string(),
            "Naming collision: talk.md [slides] compile and talk.md [handout] compile both produce talk.pdf"
        );
    }

    #[test]
    fn test_stage_error_accessors() {
        let unit = Unit::new("a.md", "slides", Stage::Convert);
        let err = StageError::conversion(unit.clone(), "exited with status 2", "boom");
        assert_eq!(err.unit(), &unit);
        assert_eq!(err.kind(), "conversion");
        assert_eq!(err.reason(), "exited with status 2");
        assert_eq!(err.output(), "boom");
        assert_eq!(
            err.to_string(),
            "conversion failed for a.md [slides] convert: exited with status 2"
        );
    }

    #[test]
    fn test_relocation_has_no_tool_output() {
        let unit = Unit::new("a.md", "slides", Stage::Compile);
        let err = StageError::relocation(unit, "missing");
        assert_eq!(err.kind(), "relocation");
        assert!(err.output().is_empty());
    }
}
