//! Artifact naming
//!
//! Derived paths are a pure function of the source path and the profile:
//! the source's extension is replaced by the profile's intermediate or final
//! extension, and the artifact lands next to its source.

use crate::catalog::SourceCatalog;
use crate::error::{BuildError, BuildResult};
use crate::profile::{BuildProfile, ProfileSet};
use crate::unit::{Stage, Unit};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Path of the intermediate artifact
pub fn intermediate_path(source: &Path, profile: &BuildProfile) -> PathBuf {
    source.with_extension(&profile.intermediate_extension)
}

/// Path of the final artifact, when the profile compiles
pub fn final_path(source: &Path, profile: &BuildProfile) -> Option<PathBuf> {
    if !profile.compiles() {
        return None;
    }
    profile
        .final_extension
        .as_ref()
        .map(|ext| source.with_extension(ext))
}

/// Path produced by a stage, if the profile has that stage
pub fn artifact_path(source: &Path, profile: &BuildProfile, stage: Stage) -> Option<PathBuf> {
    match stage {
        Stage::Convert => Some(intermediate_path(source, profile)),
        Stage::Compile => final_path(source, profile),
    }
}

/// File name the compiler writes into its scratch directory
pub fn scratch_output_name(intermediate: &Path, output_extension: &str) -> PathBuf {
    let stem = intermediate.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(output_extension);
    PathBuf::from(name)
}

/// Compiler byproducts left next to the intermediate
pub fn byproduct_paths(source: &Path, profile: &BuildProfile) -> Vec<PathBuf> {
    let Some(compiler) = &profile.compiler else {
        return Vec::new();
    };
    let intermediate = intermediate_path(source, profile);
    compiler
        .byproducts
        .iter()
        .map(|ext| intermediate.with_extension(ext))
        .collect()
}

/// Verify that no two units produce the same path and no unit overwrites a source
///
/// Runs before any tool is invoked, so a collision aborts the run with
/// nothing written.
pub fn check_collisions(catalog: &SourceCatalog, profiles: &ProfileSet) -> BuildResult<()> {
    let mut claimed: HashMap<PathBuf, Unit> = HashMap::new();

    for doc in catalog.iter() {
        for profile in profiles.iter().filter(|p| doc.has_profile(&p.name)) {
            for stage in Stage::all() {
                let Some(path) = artifact_path(&doc.path, profile, stage) else {
                    continue;
                };
                let unit = Unit::new(&doc.relative, &profile.name, stage);

                if let Some(source) = catalog.iter().find(|d| d.path == path) {
                    return Err(BuildError::NamingCollision {
                        path,
                        first: format!("source {}", source.relative.display()),
                        second: unit.to_string(),
                    });
                }

                if let Some(existing) = claimed.get(&path) {
                    return Err(BuildError::collision(path, existing, &unit));
                }
                claimed.insert(path, unit);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceDocument;
    use quire_config::{Config, ProjectConfig};
    use rstest::rstest;

    fn profiles(toml: &str) -> ProfileSet {
        let config = Config::from_project(ProjectConfig::parse(toml).unwrap(), "/docs");
        ProfileSet::from_config(&config).unwrap()
    }

    fn catalog(names: &[&str], set: &ProfileSet) -> SourceCatalog {
        SourceCatalog::from_documents(
            names
                .iter()
                .map(|name| SourceDocument {
                    path: Path::new("/docs").join(name),
                    relative: PathBuf::from(name),
                    profiles: set.applicable_to(Path::new(name)),
                })
                .collect(),
        )
    }

    const SLIDES: &str = r#"
[compilers.latex]
program = "latexmk"
output_extension = "pdf"
byproducts = ["log", "aux"]

[profiles.slides]
intermediate = "slides.tex"
final = "slides.pdf"
compiler = "latex"

[profiles.outline]
intermediate = "outline.html"
"#;

    #[test]
    fn test_artifact_paths() {
        let set = profiles(SLIDES);
        let slides = set.get("slides").unwrap();
        let outline = set.get("outline").unwrap();
        let source = Path::new("/docs/talk.md");

        assert_eq!(
            artifact_path(source, slides, Stage::Convert),
            Some(PathBuf::from("/docs/talk.slides.tex"))
        );
        assert_eq!(
            artifact_path(source, slides, Stage::Compile),
            Some(PathBuf::from("/docs/talk.slides.pdf"))
        );
        assert_eq!(
            intermediate_path(source, outline),
            PathBuf::from("/docs/talk.outline.html")
        );
        assert_eq!(final_path(source, outline), None);
    }

    #[test]
    fn test_naming_is_deterministic() {
        let set = profiles(SLIDES);
        let slides = set.get("slides").unwrap();
        let source = Path::new("/docs/talk.md");
        assert_eq!(
            intermediate_path(source, slides),
            intermediate_path(source, slides)
        );
    }

    #[rstest]
    #[case("/docs/talk.slides.tex", "pdf", "talk.slides.pdf")]
    #[case("/docs/notes.tex", "dvi", "notes.dvi")]
    #[case("/docs/sub/a.b.c.ms", "ps", "a.b.c.ps")]
    fn test_scratch_output_name(
        #[case] intermediate: &str,
        #[case] extension: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(
            scratch_output_name(Path::new(intermediate), extension),
            PathBuf::from(expected)
        );
    }

    #[test]
    fn test_byproducts() {
        let set = profiles(SLIDES);
        let source = Path::new("/docs/talk.md");
        assert_eq!(
            byproduct_paths(source, set.get("slides").unwrap()),
            vec![
                PathBuf::from("/docs/talk.slides.log"),
                PathBuf::from("/docs/talk.slides.aux")
            ]
        );
        assert!(byproduct_paths(source, set.get("outline").unwrap()).is_empty());
    }

    #[test]
    fn test_no_collisions() {
        let set = profiles(SLIDES);
        let catalog = catalog(&["a.md", "b.md"], &set);
        assert!(check_collisions(&catalog, &set).is_ok());
    }

    #[test]
    fn test_same_stem_collides() {
        let set = profiles(SLIDES);
        let catalog = catalog(&["talk.md", "talk.markdown"], &set);
        let err = check_collisions(&catalog, &set).unwrap_err();
        assert!(matches!(err, BuildError::NamingCollision { .. }));
    }

    #[test]
    fn test_profiles_sharing_extension_collide() {
        let set = profiles(
            "[profiles.a]\nintermediate = \"html\"\n\n[profiles.b]\nintermediate = \"html\"\n",
        );
        let catalog = catalog(&["doc.md"], &set);
        match check_collisions(&catalog, &set).unwrap_err() {
            BuildError::NamingCollision { path, first, second } => {
                assert_eq!(path, PathBuf::from("/docs/doc.html"));
                assert_eq!(first, "doc.md [a] convert");
                assert_eq!(second, "doc.md [b] convert");
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn test_artifact_overwriting_source_collides() {
        let set = profiles("[profiles.html]\nintermediate = \"html\"\n");
        let catalog = catalog(&["page.md", "page.html"], &set);
        assert!(matches!(
            check_collisions(&catalog, &set),
            Err(BuildError::NamingCollision { .. })
        ));
    }
}
