//! Project Configuration (quire.toml)
//!
//! Handles project-level configuration stored in `quire.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Starter configuration written by `quire init`
pub const STARTER_TEMPLATE: &str = r#"# quire build configuration

[sources]
pattern = "*.md"
aux_dir = "assets"

[build]
scratch_dir = ".quire/scratch"

[converter]
program = "pandoc"
args = ["{input}", "--standalone", "-o", "{output}"]

[compilers.latex]
program = "latexmk"
args = ["-pdf", "-interaction=nonstopmode", "-outdir={outdir}", "{input}"]
output_extension = "pdf"
byproducts = ["aux", "log", "nav", "out", "snm", "toc", "fls", "fdb_latexmk"]

[profiles.slides]
intermediate = "slides.tex"
final = "slides.pdf"
compiler = "latex"
args = ["-t", "beamer"]
aux = true

[profiles.outline]
intermediate = "outline.html"

[watch]
interval_secs = 2

[clean]
caches = [".quire/cache"]
"#;

/// Project configuration from quire.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Source discovery settings
    #[serde(default)]
    pub sources: SourcesSection,

    /// Build settings
    #[serde(default)]
    pub build: BuildSection,

    /// The markup-to-intermediate converter
    #[serde(default)]
    pub converter: ConverterSection,

    /// Named intermediate-to-final compilers
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub compilers: BTreeMap<String, CompilerSection>,

    /// Named output variants
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ProfileSection>,

    /// Watch mode settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchSection>,

    /// Cleanup settings
    #[serde(default)]
    pub clean: CleanSection,
}

/// Source discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourcesSection {
    /// Glob pattern relative to the project root (default: "*.md")
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Shared asset tree pulled in by profiles with `aux = true`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux_dir: Option<PathBuf>,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            aux_dir: None,
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Scratch directory for compiler output (default: ".quire/scratch")
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Run the units of a stage concurrently
    #[serde(default)]
    pub parallel: bool,

    /// Worker count when running in parallel (default: number of CPUs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            parallel: false,
            jobs: None,
        }
    }
}

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConverterSection {
    /// Program name or path (default: "pandoc")
    #[serde(default = "default_converter_program")]
    pub program: String,

    /// Argument template; `{input}` and `{output}` are substituted per unit
    #[serde(default = "default_converter_args")]
    pub args: Vec<String>,
}

impl Default for ConverterSection {
    fn default() -> Self {
        Self {
            program: default_converter_program(),
            args: default_converter_args(),
        }
    }
}

/// Compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompilerSection {
    /// Program name or path
    pub program: String,

    /// Argument template; `{input}` and `{outdir}` are substituted per unit
    #[serde(default)]
    pub args: Vec<String>,

    /// Extension of the file the compiler writes into the scratch directory
    pub output_extension: String,

    /// Extensions of log byproducts left next to the intermediate
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub byproducts: Vec<String>,
}

/// Profile configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfileSection {
    /// Extension of the intermediate artifact (e.g. "slides.tex")
    pub intermediate: String,

    /// Extension of the final artifact; required when `compiler` is set
    #[serde(rename = "final")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_extension: Option<String>,

    /// Name of a `[compilers.*]` entry; absent when the intermediate is final
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,

    /// Extra converter arguments for this profile
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Whether the auxiliary asset tree is part of the dependency set
    #[serde(default)]
    pub aux: bool,

    /// Restrict the profile to sources matching one of these globs
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Seconds between rebuilds
    pub interval_secs: f64,
}

/// Cleanup configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CleanSection {
    /// Cache paths removed by `clean --all`, relative to the project root
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub caches: Vec<PathBuf>,
}

fn default_pattern() -> String {
    "*.md".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".quire/scratch")
}

fn default_converter_program() -> String {
    "pandoc".to_string()
}

fn default_converter_args() -> Vec<String> {
    vec![
        "{input}".to_string(),
        "-o".to_string(),
        "{output}".to_string(),
    ]
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::TomlParseError { error, .. } => ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error,
            },
            other => other,
        })?;

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: PathBuf::from(crate::PROJECT_CONFIG_FILE),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sources.pattern.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sources.pattern".to_string(),
                reason: "pattern cannot be empty".to_string(),
            });
        }

        // A relative scratch dir made only of `.` and `..` is the root or above it
        let scratch = &self.build.scratch_dir;
        if scratch.is_relative()
            && normalize_path(scratch)
                .components()
                .all(|c| c == Component::ParentDir)
        {
            return Err(ConfigError::InvalidValue {
                field: "build.scratch_dir".to_string(),
                reason: "scratch directory cannot be or contain the project root".to_string(),
            });
        }

        if self.build.jobs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "build.jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.converter.program.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "converter.program".to_string(),
                reason: "program cannot be empty".to_string(),
            });
        }

        for (name, compiler) in &self.compilers {
            if compiler.program.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("compilers.{}.program", name),
                    reason: "program cannot be empty".to_string(),
                });
            }
            validate_extension(
                &format!("compilers.{}.output_extension", name),
                &compiler.output_extension,
            )?;
        }

        if self.profiles.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [profiles.<name>] section is required".to_string(),
            ));
        }

        for (name, profile) in &self.profiles {
            validate_profile(name, profile, self)?;
        }

        if let Some(watch) = &self.watch {
            if watch.interval_secs <= 0.0 || !watch.interval_secs.is_finite() {
                return Err(ConfigError::InvalidValue {
                    field: "watch.interval_secs".to_string(),
                    reason: format!("must be a positive number, got {}", watch.interval_secs),
                });
            }
        }

        Ok(())
    }

    /// Names of all configured profiles, in sorted order
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Option<&ProfileSection> {
        self.profiles.get(name)
    }

    /// Look up the compiler a profile uses, if any
    pub fn compiler_for(&self, profile: &ProfileSection) -> Option<&CompilerSection> {
        profile
            .compiler
            .as_deref()
            .and_then(|name| self.compilers.get(name))
    }
}

fn validate_profile(
    name: &str,
    profile: &ProfileSection,
    config: &ProjectConfig,
) -> ConfigResult<()> {
    if name.is_empty() || name.contains(':') || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidValue {
            field: format!("profiles.{}", name),
            reason: "profile names must be non-empty and contain no ':' or whitespace".to_string(),
        });
    }

    validate_extension(&format!("profiles.{}.intermediate", name), &profile.intermediate)?;

    match (&profile.compiler, &profile.final_extension) {
        (Some(compiler), Some(final_ext)) => {
            if !config.compilers.contains_key(compiler) {
                return Err(ConfigError::InvalidValue {
                    field: format!("profiles.{}.compiler", name),
                    reason: format!("no [compilers.{}] section is defined", compiler),
                });
            }
            validate_extension(&format!("profiles.{}.final", name), final_ext)?;
        }
        (Some(_), None) => {
            return Err(ConfigError::InvalidValue {
                field: format!("profiles.{}.final", name),
                reason: "a profile with a compiler needs a final extension".to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(ConfigError::InvalidValue {
                field: format!("profiles.{}.compiler", name),
                reason: "a final extension needs a compiler to produce it".to_string(),
            });
        }
        (None, None) => {}
    }

    if profile.aux && config.sources.aux_dir.is_none() {
        return Err(ConfigError::InvalidValue {
            field: format!("profiles.{}.aux", name),
            reason: "sources.aux_dir is not set".to_string(),
        });
    }

    Ok(())
}

fn validate_extension(field: &str, ext: &str) -> ConfigResult<()> {
    if ext.is_empty() || ext.starts_with('.') || ext.ends_with('.') || ext.contains('/') {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a valid extension", ext),
        });
    }
    Ok(())
}

/// Resolve `.` and `..` components without touching the filesystem
///
/// A `..` that would climb above the start of a relative path is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MINIMAL: &str = r#"
[profiles.notes]
intermediate = "html"
"#;

    #[test]
    fn test_parse_minimal_project_config() {
        let config = ProjectConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.sources.pattern, "*.md");
        assert_eq!(config.build.scratch_dir, PathBuf::from(".quire/scratch"));
        assert_eq!(config.converter.program, "pandoc");
        assert_eq!(config.profile_names(), vec!["notes"]);
        assert!(config.compilers.is_empty());
    }

    #[test]
    fn test_starter_template_is_valid() {
        let config = ProjectConfig::parse(STARTER_TEMPLATE).unwrap();
        assert_eq!(config.profile_names(), vec!["outline", "slides"]);

        let slides = config.profile("slides").unwrap();
        assert_eq!(slides.final_extension.as_deref(), Some("slides.pdf"));
        assert_eq!(config.compiler_for(slides).unwrap().output_extension, "pdf");
        assert!(config.compiler_for(config.profile("outline").unwrap()).is_none());
    }

    #[test]
    fn test_requires_a_profile() {
        let err = ProjectConfig::parse("[sources]\npattern = \"*.md\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ProjectConfig::parse("[profiles.a]\nintermediate = \"x\"\nbogus = 1\n");
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }

    #[test]
    fn test_compiler_without_final_extension() {
        let toml = r#"
[compilers.latex]
program = "latexmk"
output_extension = "pdf"

[profiles.slides]
intermediate = "tex"
compiler = "latex"
"#;
        let err = ProjectConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("profiles.slides.final"));
    }

    #[test]
    fn test_unknown_compiler_reference() {
        let toml = r#"
[profiles.slides]
intermediate = "tex"
final = "pdf"
compiler = "typst"
"#;
        let err = ProjectConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("compilers.typst"));
    }

    #[test]
    fn test_aux_requires_aux_dir() {
        let toml = r#"
[profiles.slides]
intermediate = "tex"
aux = true
"#;
        assert!(ProjectConfig::parse(toml).is_err());
    }

    #[test]
    fn test_profile_name_with_colon_rejected() {
        let toml = r#"
[profiles."a:b"]
intermediate = "tex"
"#;
        assert!(ProjectConfig::parse(toml).is_err());
    }

    #[test]
    fn test_extension_validation() {
        assert!(validate_extension("f", "pdf").is_ok());
        assert!(validate_extension("f", "slides.pdf").is_ok());
        assert!(validate_extension("f", "").is_err());
        assert!(validate_extension("f", ".pdf").is_err());
        assert!(validate_extension("f", "a/b").is_err());
    }

    #[test]
    fn test_scratch_dir_cannot_be_root() {
        let toml = r#"
[build]
scratch_dir = "."

[profiles.a]
intermediate = "tex"
"#;
        assert!(ProjectConfig::parse(toml).is_err());
    }

    #[rstest]
    #[case("sub/..")]
    #[case("./")]
    #[case("..")]
    #[case("a/../..")]
    fn test_scratch_dir_cannot_reach_root(#[case] scratch: &str) {
        let toml = format!(
            "[build]\nscratch_dir = \"{}\"\n\n[profiles.a]\nintermediate = \"tex\"\n",
            scratch
        );
        let err = ProjectConfig::parse(&toml).unwrap_err();
        assert!(err.to_string().contains("build.scratch_dir"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_path(Path::new("sub/..")), PathBuf::new());
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("/a/b/../..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_watch_interval_must_be_positive() {
        let toml = r#"
[profiles.a]
intermediate = "tex"

[watch]
interval_secs = 0
"#;
        assert!(ProjectConfig::parse(toml).is_err());

        let toml = toml.replace("interval_secs = 0", "interval_secs = 0.5");
        let config = ProjectConfig::parse(&toml).unwrap();
        assert_eq!(config.watch.unwrap().interval_secs, 0.5);
    }
}
