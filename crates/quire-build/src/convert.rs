//! Markup-to-intermediate conversion

use crate::catalog::SourceDocument;
use crate::error::StageError;
use crate::naming;
use crate::profile::{BuildProfile, ConverterSpec};
use crate::tool::{Placeholders, ToolInvocation};
use crate::unit::{Stage, Unit};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runs the converter for one (source, profile) pair
///
/// The argument template sees `{input}`, `{output}`, `{profile}`, `{stem}`
/// and `{root}`; the profile's own arguments are appended after it.
pub struct ConversionStage<'a> {
    converter: &'a ConverterSpec,
    root: &'a Path,
}

impl<'a> ConversionStage<'a> {
    pub fn new(converter: &'a ConverterSpec, root: &'a Path) -> Self {
        Self { converter, root }
    }

    /// Produce the intermediate artifact, returning its path
    pub fn convert(
        &self,
        doc: &SourceDocument,
        profile: &BuildProfile,
    ) -> Result<PathBuf, StageError> {
        let unit = Unit::new(&doc.relative, &profile.name, Stage::Convert);
        let output = naming::intermediate_path(&doc.path, profile);
        let invocation = self.invocation(doc, profile, &output);

        info!(unit = %unit, "converting");
        let result = invocation.run().map_err(|e| {
            StageError::conversion(
                unit.clone(),
                format!("failed to run {}: {}", self.converter.program.display(), e),
                String::new(),
            )
        })?;

        if !result.success() {
            return Err(StageError::conversion(unit, result.status(), result.output()));
        }

        if !output.is_file() {
            return Err(StageError::conversion(
                unit,
                format!("converter succeeded but did not write {}", output.display()),
                result.output(),
            ));
        }

        debug!(unit = %unit, elapsed_ms = result.elapsed.as_millis() as u64, "converted");
        Ok(output)
    }

    /// The expanded command for a unit
    pub fn invocation(
        &self,
        doc: &SourceDocument,
        profile: &BuildProfile,
        output: &Path,
    ) -> ToolInvocation {
        let stem = doc
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let placeholders = Placeholders::new()
            .set_path("input", &doc.path)
            .set_path("output", output)
            .set("profile", &profile.name)
            .set("stem", stem)
            .set_path("root", self.root);

        ToolInvocation::new(&self.converter.program)
            .with_args(placeholders.expand_all(&self.converter.args))
            .with_args(placeholders.expand_all(&profile.converter_args))
            .with_current_dir(self.root)
    }
}
