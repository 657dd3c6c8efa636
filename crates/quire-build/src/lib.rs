//! Quire build orchestration
//!
//! Turns markup sources into derived documents in two steps:
//! - conversion of each source into one intermediate per profile
//! - compilation of intermediates into finals, via a scratch directory
//!
//! Work is incremental (modification-time staleness), failures are isolated
//! per unit, and goals are composed in an explicit [`GoalGraph`].

pub mod catalog;
pub mod clean;
pub mod compile;
pub mod convert;
pub mod error;
pub mod goals;
pub mod naming;
pub mod orchestrator;
pub mod profile;
pub mod report;
pub mod scratch;
pub mod staleness;
pub mod tool;
pub mod unit;
pub mod watch;

// Re-export main types
pub use catalog::{SourceCatalog, SourceDocument};
pub use compile::CompilationStage;
pub use convert::ConversionStage;
pub use error::{BuildError, BuildResult, StageError};
pub use goals::{Goal, GoalAction, GoalGraph};
pub use orchestrator::{Orchestrator, RunSummary, UnitStatus};
pub use profile::{BuildProfile, CompilerSpec, ConverterSpec, ProfileSet};
pub use report::{FailureReporter, UnitFailure};
pub use scratch::ScratchDir;
pub use staleness::{is_stale, DependencySet, Staleness};
pub use tool::{Placeholders, ToolInvocation, ToolOutput};
pub use unit::{DerivedArtifact, Stage, Unit};
pub use watch::{watch, WatchEvent, WatchLoop};

// Re-export quire-config types for convenience
pub use quire_config::{Config, ConfigLoader};
