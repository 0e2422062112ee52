use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Prefix of in-flight staging files; listings skip names starting with it.
pub const STAGING_PREFIX: &str = ".lading-";

pub fn is_staging_name(name: &str) -> bool { name.starts_with(STAGING_PREFIX) }

/// A file being written next to its final destination.
///
/// Bytes only become visible under the destination name on [`commit`], which
/// renames the staging file into place. Dropping an uncommitted file removes it.
///
/// [`commit`]: StagedFile::commit
#[derive(Debug)]
pub struct StagedFile {
    inner:   NamedTempFile,
    written: u64,
}

impl StagedFile {
    pub fn new_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::Write {
            path:   dir.to_path_buf(),
            source: e,
        })?;

        let inner = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| Error::Write {
                path:   dir.to_path_buf(),
                source: e,
            })?;

        Ok(Self { inner, written: 0 })
    }

    /// Stage a copy of `src` in `dir`.
    pub fn copy_of(src: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<Self> {
        let src = src.as_ref();
        let mut input = std::fs::File::open(src).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(src.to_path_buf()),
            _ => Error::Read {
                path:   src.to_path_buf(),
                source: e,
            },
        })?;

        let mut staged = Self::new_in(dir)?;
        let copied = io::copy(&mut input, staged.inner.as_file_mut()).map_err(|e| Error::Write {
            path:   staged.path().to_path_buf(),
            source: e,
        })?;
        staged.written = copied;
        Ok(staged)
    }

    pub fn path(&self) -> &Path { self.inner.path() }

    pub fn written(&self) -> u64 { self.written }

    /// Flush and rename into `target`, replacing whatever was there.
    pub fn commit(mut self, target: impl AsRef<Path>, sync: bool) -> Result<PathBuf> {
        let target = target.as_ref();
        let staging = self.path().to_path_buf();

        self.inner.flush().map_err(|e| Error::Write {
            path:   staging.clone(),
            source: e,
        })?;
        if sync {
            self.inner.as_file().sync_all().map_err(|e| Error::Write {
                path:   staging.clone(),
                source: e,
            })?;
        }

        self.inner.persist(target).map_err(|e| Error::Write {
            path:   target.to_path_buf(),
            source: e.error,
        })?;

        tracing::trace!(staging = %staging.display(), target = %target.display(), "staged file committed");
        Ok(target.to_path_buf())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}
