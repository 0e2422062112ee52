//! Filesystem primitives for Lading caches.
//!
//! - [`PathLock`] - advisory shared/exclusive lock on a lock file (fs2)
//! - [`StagedFile`] - write next to the destination, rename into place on commit
//! - [`remove_path`], [`list_dir`] - small helpers for cache maintenance

mod error;
mod lock;
mod staged;

pub use error::{Error, Result};
pub use lock::{LockMode, PathLock};
pub use staged::{STAGING_PREFIX, StagedFile, is_staging_name};

use std::io;
use std::path::Path;

/// Remove a file or a whole directory tree. Returns whether anything existed.
pub fn remove_path(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(Error::Read {
                path:   path.to_path_buf(),
                source: e,
            });
        }
    };

    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Write {
            path:   path.to_path_buf(),
            source: e,
        }),
    }
}

/// Sorted child names of `dir`, without staging files. Missing dirs list empty.
pub fn list_dir(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(Error::Read {
                path:   dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Read {
            path:   dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_staging_name(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_remove_path_file_dir_and_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        let tree = dir.path().join("b/c");
        std::fs::write(&file, "x").unwrap();
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("d.txt"), "y").unwrap();

        assert!(remove_path(&file).unwrap());
        assert!(remove_path(dir.path().join("b")).unwrap());
        assert!(!remove_path(dir.path().join("b")).unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn test_list_dir_skips_staging() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let _staged = StagedFile::new_in(dir.path()).unwrap();

        assert_eq!(list_dir(dir.path()).unwrap(), vec!["a.txt", "b.txt"]);
        assert!(list_dir(dir.path().join("missing")).unwrap().is_empty());
    }
}
