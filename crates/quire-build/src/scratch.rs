//! Scratch directory for compiler output

use crate::unit::Unit;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Working area the compiler writes into before relocation
///
/// Sequential runs share the directory itself; parallel runs give each unit
/// its own partition so concurrent compilers never see each other's files.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-unit subdirectory
    pub fn partition(&self, unit: &Unit) -> PathBuf {
        self.path.join(unit.key())
    }

    /// Create a directory inside the scratch area if needed
    pub fn ensure(dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    /// Remove everything inside the scratch directory, keeping the directory
    ///
    /// Returns the number of top-level entries removed.
    pub fn purge(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}
