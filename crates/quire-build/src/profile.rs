//! Build profile management
//!
//! Resolves the `[converter]`, `[compilers.*]` and `[profiles.*]` sections of
//! the project configuration into the tool invocations and naming rules the
//! stages consume.

use crate::error::{BuildError, BuildResult};
use glob::Pattern;
use quire_config::Config;
use std::path::{Path, PathBuf};

/// The markup-to-intermediate converter
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterSpec {
    /// Resolved program path
    pub program: PathBuf,
    /// Argument template
    pub args: Vec<String>,
}

/// An intermediate-to-final compiler
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerSpec {
    /// Name of the `[compilers.*]` entry
    pub name: String,
    /// Resolved program path
    pub program: PathBuf,
    /// Argument template
    pub args: Vec<String>,
    /// Extension of the file written into the scratch directory
    pub output_extension: String,
    /// Extensions of byproducts left next to the intermediate
    pub byproducts: Vec<String>,
}

/// A named output variant
#[derive(Debug, Clone)]
pub struct BuildProfile {
    /// Profile name
    pub name: String,
    /// Extension of the intermediate artifact
    pub intermediate_extension: String,
    /// Extension of the final artifact, when the profile compiles
    pub final_extension: Option<String>,
    /// Extra converter arguments
    pub converter_args: Vec<String>,
    /// Compiler, when the profile has a second stage
    pub compiler: Option<CompilerSpec>,
    /// Whether the auxiliary tree is part of the dependency set
    pub uses_aux: bool,
    only: Vec<Pattern>,
}

impl BuildProfile {
    /// Whether this profile builds the given source (path relative to the project root)
    pub fn applies_to(&self, relative: &Path) -> bool {
        self.only.is_empty() || self.only.iter().any(|p| p.matches_path(relative))
    }

    /// Whether the profile has a compilation stage
    pub fn compiles(&self) -> bool {
        self.compiler.is_some() && self.final_extension.is_some()
    }
}

/// All profiles of a project plus the shared converter
#[derive(Debug, Clone)]
pub struct ProfileSet {
    converter: ConverterSpec,
    profiles: Vec<BuildProfile>,
}

impl ProfileSet {
    /// Resolve profiles from a loaded configuration
    pub fn from_config(config: &Config) -> BuildResult<Self> {
        let project = &config.project;

        let converter = ConverterSpec {
            program: config.program(&project.converter.program),
            args: project.converter.args.clone(),
        };

        let mut profiles = Vec::with_capacity(project.profiles.len());
        for (name, section) in &project.profiles {
            let compiler = match project.compiler_for(section) {
                Some(compiler) => Some(CompilerSpec {
                    name: section.compiler.clone().unwrap_or_default(),
                    program: config.program(&compiler.program),
                    args: compiler.args.clone(),
                    output_extension: compiler.output_extension.clone(),
                    byproducts: compiler.byproducts.clone(),
                }),
                None => None,
            };

            let only = section
                .only
                .iter()
                .map(|glob| Pattern::new(glob).map_err(|e| BuildError::discovery(glob, e)))
                .collect::<BuildResult<Vec<_>>>()?;

            profiles.push(BuildProfile {
                name: name.clone(),
                intermediate_extension: section.intermediate.clone(),
                final_extension: section.final_extension.clone(),
                converter_args: section.args.clone(),
                compiler,
                uses_aux: section.aux,
                only,
            });
        }

        Ok(Self {
            converter,
            profiles,
        })
    }

    /// The shared converter
    pub fn converter(&self) -> &ConverterSpec {
        &self.converter
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> BuildResult<&BuildProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| BuildError::UnknownProfile {
                profile: name.to_string(),
            })
    }

    /// Check if profile exists
    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p.name == name)
    }

    /// All profiles, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &BuildProfile> {
        self.profiles.iter()
    }

    /// List all profile names, sorted
    pub fn list_profiles(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    /// Names of the profiles that apply to a source
    pub fn applicable_to(&self, relative: &Path) -> Vec<String> {
        self.profiles
            .iter()
            .filter(|p| p.applies_to(relative))
            .map(|p| p.name.clone())
            .collect()
    }
}
