//! Cleanup of derived artifacts, scratch output and caches
//!
//! Only paths the orchestrator derives are ever removed. Sources are never in
//! that set because the collision check rejects any artifact path that names
//! a source.

use crate::catalog::SourceCatalog;
use crate::error::{BuildError, BuildResult};
use crate::naming;
use crate::profile::ProfileSet;
use crate::scratch::ScratchDir;
use crate::unit::Stage;
use quire_config::normalize_path;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remove a file or directory tree; a missing path is not an error
///
/// Returns whether anything was removed.
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    debug!(path = %path.display(), "removed");
    Ok(true)
}

/// Remove every derived artifact and the scratch directory's contents
pub fn clean_derived(
    catalog: &SourceCatalog,
    profiles: &ProfileSet,
    scratch: &ScratchDir,
    config_path: &Path,
) -> BuildResult<usize> {
    check_scratch(scratch, catalog, config_path)?;
    let mut removed = 0;
    for path in derived_paths(catalog, profiles) {
        if remove_path(&path).map_err(|e| BuildError::io(&path, e))? {
            removed += 1;
        }
    }
    removed += purge_scratch(scratch)?;
    Ok(removed)
}

/// Remove scratch contents and compiler byproducts, keeping every artifact
pub fn clean_scratch(
    catalog: &SourceCatalog,
    profiles: &ProfileSet,
    scratch: &ScratchDir,
    config_path: &Path,
) -> BuildResult<usize> {
    check_scratch(scratch, catalog, config_path)?;
    let mut removed = purge_scratch(scratch)?;
    for doc in catalog.iter() {
        for profile in profiles.iter().filter(|p| doc.has_profile(&p.name)) {
            for path in naming::byproduct_paths(&doc.path, profile) {
                if remove_path(&path).map_err(|e| BuildError::io(&path, e))? {
                    removed += 1;
                }
            }
        }
    }
    Ok(removed)
}

/// Remove configured cache paths
pub fn clean_caches(paths: &[PathBuf]) -> BuildResult<usize> {
    let mut removed = 0;
    for path in paths {
        if remove_path(path).map_err(|e| BuildError::io(path, e))? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Every path the catalog and profiles derive, in catalog order
pub fn derived_paths(catalog: &SourceCatalog, profiles: &ProfileSet) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for doc in catalog.iter() {
        for profile in profiles.iter().filter(|p| doc.has_profile(&p.name)) {
            paths.extend(
                Stage::all()
                    .into_iter()
                    .filter_map(|stage| naming::artifact_path(&doc.path, profile, stage)),
            );
        }
    }
    paths
}

/// Refuse to purge a scratch directory that holds the config file or a source
fn check_scratch(
    scratch: &ScratchDir,
    catalog: &SourceCatalog,
    config_path: &Path,
) -> BuildResult<()> {
    let root = normalize_path(scratch.path());
    let protected =
        std::iter::once(config_path).chain(catalog.iter().map(|doc| doc.path.as_path()));
    for path in protected {
        if normalize_path(path).starts_with(&root) {
            return Err(BuildError::UnsafeScratch {
                path: scratch.path().to_path_buf(),
                protected: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn purge_scratch(scratch: &ScratchDir) -> BuildResult<usize> {
    scratch
        .purge()
        .map_err(|e| BuildError::io(scratch.path(), e))
}
