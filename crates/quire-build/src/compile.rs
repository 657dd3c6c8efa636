//! Intermediate-to-final compilation and relocation

use crate::catalog::SourceDocument;
use crate::error::StageError;
use crate::naming;
use crate::profile::BuildProfile;
use crate::scratch::ScratchDir;
use crate::tool::{Placeholders, ToolInvocation};
use crate::unit::{Stage, Unit};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runs a profile's compiler and moves its output next to the source
///
/// The compiler writes `<intermediate stem>.<output_extension>` into the
/// scratch directory it is given; that file is then relocated to the final
/// artifact path. The argument template sees `{input}`, `{outdir}`,
/// `{stem}` and `{root}`.
pub struct CompilationStage<'a> {
    root: &'a Path,
}

impl<'a> CompilationStage<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Produce the final artifact, returning its path
    pub fn compile(
        &self,
        doc: &SourceDocument,
        profile: &BuildProfile,
        scratch: &Path,
    ) -> Result<PathBuf, StageError> {
        let unit = Unit::new(&doc.relative, &profile.name, Stage::Compile);

        let (Some(compiler), Some(final_path)) =
            (&profile.compiler, naming::final_path(&doc.path, profile))
        else {
            return Err(StageError::compile(
                unit,
                "profile has no compilation stage",
                String::new(),
            ));
        };

        let intermediate = naming::intermediate_path(&doc.path, profile);
        let expected = scratch.join(naming::scratch_output_name(
            &intermediate,
            &compiler.output_extension,
        ));

        ScratchDir::ensure(scratch).map_err(|e| {
            StageError::compile(
                unit.clone(),
                format!("cannot prepare scratch directory {}: {}", scratch.display(), e),
                String::new(),
            )
        })?;
        remove_if_exists(&expected).map_err(|e| {
            StageError::compile(
                unit.clone(),
                format!("cannot clear stale {}: {}", expected.display(), e),
                String::new(),
            )
        })?;

        let stem = intermediate
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let placeholders = Placeholders::new()
            .set_path("input", &intermediate)
            .set_path("outdir", scratch)
            .set("stem", stem)
            .set_path("root", self.root);
        let invocation = ToolInvocation::new(&compiler.program)
            .with_args(placeholders.expand_all(&compiler.args))
            .with_current_dir(self.root);

        info!(unit = %unit, compiler = %compiler.name, "compiling");
        let result = invocation.run().map_err(|e| {
            StageError::compile(
                unit.clone(),
                format!("failed to run {}: {}", compiler.program.display(), e),
                String::new(),
            )
        })?;

        if !result.success() {
            return Err(StageError::compile(unit, result.status(), result.output()));
        }

        if !expected.is_file() {
            return Err(StageError::relocation(
                unit,
                format!(
                    "compiler did not produce {} in the scratch directory",
                    expected.display()
                ),
            ));
        }

        relocate(&expected, &final_path).map_err(|e| {
            StageError::relocation(
                unit.clone(),
                format!(
                    "cannot move {} to {}: {}",
                    expected.display(),
                    final_path.display(),
                    e
                ),
            )
        })?;

        debug!(unit = %unit, elapsed_ms = result.elapsed.as_millis() as u64, "compiled");
        Ok(final_path)
    }
}

/// Move a file, copying across filesystems when a rename is not possible
pub fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(from = %from.display(), error = %e, "rename failed, copying");
            copy_and_remove(from, to)
        }
    }
}

fn copy_and_remove(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
