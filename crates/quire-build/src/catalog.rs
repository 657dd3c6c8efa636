//! Source discovery
//!
//! The catalog is rebuilt from the filesystem on every run; nothing about the
//! set of sources is remembered between runs.

use crate::error::{BuildError, BuildResult};
use crate::profile::ProfileSet;
use glob::{glob, Pattern};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// A markup file the user maintains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the project root
    pub relative: PathBuf,
    /// Names of the profiles built from this source
    pub profiles: Vec<String>,
}

impl SourceDocument {
    /// Current modification time, read from the filesystem
    pub fn modified(&self) -> io::Result<SystemTime> {
        std::fs::metadata(&self.path)?.modified()
    }

    /// Whether a profile applies to this source
    pub fn has_profile(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }
}

/// The ordered set of source documents found by the discovery pattern
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    documents: Vec<SourceDocument>,
}

impl SourceCatalog {
    /// Enumerate every file under `root` matching `pattern`
    ///
    /// Paths are sorted, so iteration order is stable between runs. An
    /// empty match set is a valid, empty catalog.
    pub fn discover(root: &Path, pattern: &str, profiles: &ProfileSet) -> BuildResult<Self> {
        let full_pattern = format!(
            "{}/{}",
            Pattern::escape(&root.to_string_lossy()),
            pattern
        );
        debug!(pattern = %full_pattern, "discovering sources");

        let entries = glob(&full_pattern).map_err(|e| BuildError::discovery(pattern, e))?;

        let mut documents = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| BuildError::discovery(pattern, e))?;
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let applicable = profiles.applicable_to(&relative);
            documents.push(SourceDocument {
                path,
                relative,
                profiles: applicable,
            });
        }

        documents.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = documents.len(), "discovered sources");

        Ok(Self { documents })
    }

    /// Build a catalog from explicit documents
    pub fn from_documents(mut documents: Vec<SourceDocument>) -> Self {
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Self { documents }
    }

    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDocument> {
        self.documents.iter()
    }

    /// Sources a profile applies to, in catalog order
    pub fn for_profile<'a>(
        &'a self,
        profile: &'a str,
    ) -> impl Iterator<Item = &'a SourceDocument> + 'a {
        self.documents.iter().filter(move |d| d.has_profile(profile))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Check whether a path is one of the catalogued sources
    pub fn contains(&self, path: &Path) -> bool {
        self.documents.iter().any(|d| d.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_config::{Config, ProjectConfig};
    use std::fs;
    use tempfile::TempDir;

    fn profiles(toml: &str) -> ProfileSet {
        let config = Config::from_project(ProjectConfig::parse(toml).unwrap(), "/docs");
        ProfileSet::from_config(&config).unwrap()
    }

    const ONE_PROFILE: &str = "[profiles.notes]\nintermediate = \"html\"\n";

    #[test]
    fn test_discover_sorted() {
        let temp = TempDir::new().unwrap();
        for name in ["c.md", "a.md", "b.md", "skip.txt"] {
            fs::write(temp.path().join(name), "# doc").unwrap();
        }

        let catalog = SourceCatalog::discover(temp.path(), "*.md", &profiles(ONE_PROFILE)).unwrap();
        let names: Vec<_> = catalog.iter().map(|d| d.relative.clone()).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.md"),
                PathBuf::from("b.md"),
                PathBuf::from("c.md")
            ]
        );
        assert!(catalog.iter().all(|d| d.has_profile("notes")));
    }

    #[test]
    fn test_discover_empty_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let catalog = SourceCatalog::discover(temp.path(), "*.md", &profiles(ONE_PROFILE)).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_discover_skips_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dir.md")).unwrap();
        fs::write(temp.path().join("real.md"), "").unwrap();

        let catalog = SourceCatalog::discover(temp.path(), "*.md", &profiles(ONE_PROFILE)).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains(&temp.path().join("real.md")));
    }

    #[test]
    fn test_discover_recursive_pattern() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("talks/2024")).unwrap();
        fs::write(temp.path().join("talks/2024/intro.md"), "").unwrap();
        fs::write(temp.path().join("top.md"), "").unwrap();

        let catalog =
            SourceCatalog::discover(temp.path(), "talks/**/*.md", &profiles(ONE_PROFILE)).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.documents()[0].relative,
            PathBuf::from("talks/2024/intro.md")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_discovery_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("talks/locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.md"), "").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory
        let readable = fs::read_dir(&locked).is_ok();
        let result = SourceCatalog::discover(temp.path(), "talks/**/*.md", &profiles(ONE_PROFILE));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        let err = result.unwrap_err();
        assert!(matches!(err, BuildError::Discovery { .. }));
        assert!(err.to_string().contains("talks/**/*.md"));
    }

    #[test]
    fn test_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let err = SourceCatalog::discover(temp.path(), "[", &profiles(ONE_PROFILE)).unwrap_err();
        assert!(matches!(err, BuildError::Discovery { .. }));
    }

    #[test]
    fn test_profile_applicability() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keynote.md"), "").unwrap();
        fs::write(temp.path().join("notes.md"), "").unwrap();

        let set = profiles(
            "[profiles.all]\nintermediate = \"html\"\n\n[profiles.key]\nintermediate = \"tex\"\nonly = [\"keynote*.md\"]\n",
        );
        let catalog = SourceCatalog::discover(temp.path(), "*.md", &set).unwrap();

        let for_key: Vec<_> = catalog.for_profile("key").map(|d| d.relative.clone()).collect();
        assert_eq!(for_key, vec![PathBuf::from("keynote.md")]);
        assert_eq!(catalog.for_profile("all").count(), 2);
    }

    #[test]
    fn test_modified_reads_live_mtime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.md");
        fs::write(&path, "").unwrap();
        let doc = SourceDocument {
            path: path.clone(),
            relative: PathBuf::from("a.md"),
            profiles: vec![],
        };
        assert!(doc.modified().is_ok());
        fs::remove_file(&path).unwrap();
        assert!(doc.modified().is_err());
    }
}
