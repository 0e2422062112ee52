use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders at once; used by readers.
    Shared,
    /// Single holder; used by writers, deletes and copies into a path.
    Exclusive,
}

/// Advisory lock held on a dedicated lock file.
///
/// The lock is visible to every thread and process that opens the same lock
/// file and is released when the value is dropped. An exclusive holder may
/// [`remove`](Self::remove) the lock file; a lock granted on a file that is no
/// longer linked at its path is given up and taken again on the current file.
#[derive(Debug)]
pub struct PathLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl PathLock {
    fn open(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Lock {
                path:   path.to_path_buf(),
                source: e,
            })?;
        }

        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::Lock {
                path:   path.to_path_buf(),
                source: e,
            })
    }

    /// Block until the lock is granted in `mode`.
    pub fn acquire(path: impl AsRef<Path>, mode: LockMode) -> Result<Self> {
        let path = path.as_ref();
        loop {
            let file = Self::open(path)?;

            let locked = match mode {
                LockMode::Shared => FileExt::lock_shared(&file),
                LockMode::Exclusive => FileExt::lock_exclusive(&file),
            };
            locked.map_err(|e| Error::Lock {
                path:   path.to_path_buf(),
                source: e,
            })?;

            if !is_linked(&file, path) {
                tracing::trace!(path = %path.display(), "lock file removed while waiting, retrying");
                continue;
            }

            tracing::trace!(path = %path.display(), ?mode, "lock acquired");
            return Ok(Self {
                file,
                path: path.to_path_buf(),
                mode,
            });
        }
    }

    /// Take the lock only if nobody holds a conflicting one.
    pub fn try_acquire(path: impl AsRef<Path>, mode: LockMode) -> Result<Option<Self>> {
        let path = path.as_ref();
        loop {
            let file = Self::open(path)?;

            let locked = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match locked {
                Ok(()) if !is_linked(&file, path) => continue,
                Ok(()) => {
                    return Ok(Some(Self {
                        file,
                        path: path.to_path_buf(),
                        mode,
                    }));
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => return Ok(None),
                Err(e) => {
                    return Err(Error::Lock {
                        path:   path.to_path_buf(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Unlink the lock file, then release the lock.
    ///
    /// Only an exclusive holder may remove its file. Where open files cannot
    /// be unlinked the file is kept and the lock is just released.
    pub fn remove(self) -> Result<()> {
        if self.mode != LockMode::Exclusive {
            return Err(Error::Lock {
                path:   self.path.clone(),
                source: io::Error::other("only an exclusive holder can remove a lock file"),
            });
        }
        match unlink(&self.path) {
            Ok(()) => {
                tracing::trace!(path = %self.path.display(), "lock file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Lock {
                path:   self.path.clone(),
                source: e,
            }),
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn mode(&self) -> LockMode { self.mode }
}

/// Whether `file` is still the file linked at `path`.
#[cfg(unix)]
fn is_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(held) = file.metadata() else {
        return true;
    };
    match std::fs::metadata(path) {
        Ok(linked) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        Err(e) => e.kind() != io::ErrorKind::NotFound,
    }
}

#[cfg(not(unix))]
fn is_linked(_file: &File, _path: &Path) -> bool { true }

#[cfg(unix)]
fn unlink(path: &Path) -> io::Result<()> { std::fs::remove_file(path) }

#[cfg(not(unix))]
fn unlink(_path: &Path) -> io::Result<()> { Ok(()) }

impl Drop for PathLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::trace!(path = %self.path.display(), mode = ?self.mode, "lock released");
    }
}
