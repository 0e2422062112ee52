use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use lading_core::Resource;
use lading_fs::{LockMode, PathLock, StagedFile};

use crate::{CacheError, CacheProvider, CacheResult, EntryReader, EntryWrite, EntryWriter, PathMapping};

/// Size and modification time of a committed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub length:          u64,
    pub modified_millis: u64,
}

impl EntryStat {
    fn of(path: &Path) -> CacheResult<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CacheError::NotFound(path.to_path_buf()),
            _ => CacheError::io(path, e),
        })?;
        if !metadata.is_file() {
            return Err(CacheError::NotFound(path.to_path_buf()));
        }

        let modified = metadata.modified().map_err(|e| CacheError::io(path, e))?;
        let modified_millis = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            length: metadata.len(),
            modified_millis,
        })
    }
}

/// Cache provider storing entries as plain files under a root directory.
///
/// Each entry is guarded by an advisory lock file under `root/.locks`, so
/// separate processes sharing the root see the same exclusion. Deletes remove
/// the lock files of the entries they remove, unless another holder still has
/// one of them locked.
#[derive(Debug, Clone)]
pub struct FileCacheProvider {
    mapping: PathMapping,
    sync:    bool,
}

impl FileCacheProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            mapping: PathMapping::new(root),
            sync:    false,
        }
    }

    /// fsync staged content before it is renamed into place.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn mapping(&self) -> &PathMapping { &self.mapping }

    pub fn root(&self) -> &Path { self.mapping.root() }

    fn lock(&self, resource: &Resource, mode: LockMode) -> CacheResult<PathLock> {
        Ok(PathLock::acquire(self.mapping.lock_path(resource), mode)?)
    }

    pub fn stat(&self, resource: &Resource) -> CacheResult<EntryStat> {
        EntryStat::of(&self.mapping.path_for(resource))
    }

    /// Delete the entry only when `evictable` accepts its current stat; the
    /// check runs under the entry's exclusive lock.
    pub(crate) fn delete_if(
        &self,
        resource: &Resource,
        evictable: impl FnOnce(EntryStat) -> bool,
    ) -> CacheResult<bool> {
        let lock = self.lock(resource, LockMode::Exclusive)?;
        let path = self.mapping.path_for(resource);
        let stat = match EntryStat::of(&path) {
            Ok(stat) => stat,
            Err(CacheError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !evictable(stat) {
            return Ok(false);
        }
        let removed = lading_fs::remove_path(&path)?;
        lock.remove()?;
        Ok(removed)
    }

    /// Files below `dir`, at any depth.
    pub(crate) fn files_under(&self, dir: &Resource) -> CacheResult<Vec<Resource>> {
        let mut files = Vec::new();
        let mut dirs = vec![dir.clone()];
        while let Some(next) = dirs.pop() {
            for name in self.list(&next)? {
                let child = next.child(&name);
                if self.is_directory(&child) {
                    dirs.push(child);
                } else {
                    files.push(child);
                }
            }
        }
        Ok(files)
    }

    /// Remove the lock files of `entries` that nobody holds.
    fn remove_locks(&self, entries: &[Resource]) -> CacheResult<()> {
        for entry in entries {
            if let Some(lock) = PathLock::try_acquire(self.mapping.lock_path(entry), LockMode::Exclusive)? {
                lock.remove()?;
            }
        }
        Ok(())
    }

    /// Copy an entry from `src_cache` into this cache, returning the new entry's stat.
    ///
    /// The source is staged next to the destination under the source's shared
    /// lock; the lock is released before the destination's exclusive lock is
    /// taken for the rename, so the two locks are never held together.
    /// `on_copied` runs while the destination lock is still held.
    pub(crate) fn copy_from(
        &self,
        src_cache: &FileCacheProvider,
        from: &Resource,
        to: &Resource,
        on_copied: impl FnOnce(EntryStat) -> CacheResult<()>,
    ) -> CacheResult<EntryStat> {
        let src_path = src_cache.mapping.path_for(from);
        let dst_path = self.mapping.path_for(to);
        let dst_dir = parent_dir(&dst_path)?;

        let staged = {
            let _read = src_cache.lock(from, LockMode::Shared)?;
            StagedFile::copy_of(&src_path, dst_dir)?
        };

        let _write = self.lock(to, LockMode::Exclusive)?;
        staged.commit(&dst_path, self.sync)?;
        let target = EntryStat::of(&dst_path)?;
        on_copied(target)?;

        tracing::trace!(from = %src_path.display(), to = %dst_path.display(), length = target.length, "cache entry copied");
        Ok(target)
    }

    /// Copy an entry into `dst_cache` while holding its shared lock here.
    ///
    /// Unlike [`copy_from`](Self::copy_from) the source stays locked until the
    /// destination rename is done and `on_pushed` has run, so a concurrent
    /// delete of the source cannot be undone by the copy landing afterwards.
    /// Callers must only ever nest locks in the order this cache, then
    /// `dst_cache`.
    pub(crate) fn push_to(
        &self,
        dst_cache: &FileCacheProvider,
        resource: &Resource,
        on_pushed: impl FnOnce(EntryStat) -> CacheResult<()>,
    ) -> CacheResult<EntryStat> {
        let src_path = self.mapping.path_for(resource);
        let dst_path = dst_cache.mapping.path_for(resource);

        let _read = self.lock(resource, LockMode::Shared)?;
        let source = EntryStat::of(&src_path)?;
        let staged = StagedFile::copy_of(&src_path, parent_dir(&dst_path)?)?;

        let _write = dst_cache.lock(resource, LockMode::Exclusive)?;
        staged.commit(&dst_path, dst_cache.sync)?;
        on_pushed(source)?;
        Ok(source)
    }
}

fn parent_dir(path: &Path) -> CacheResult<&Path> {
    path.parent()
        .ok_or_else(|| CacheError::io(path, io::Error::other("cache entry has no parent directory")))
}

struct LockedReader {
    file:  BufReader<File>,
    _lock: PathLock,
}

impl Read for LockedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.file.read(buf) }
}

struct LockedWriter {
    staged: StagedFile,
    target: PathBuf,
    sync:   bool,
    _lock:  PathLock,
}

impl Write for LockedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.staged.write(buf) }

    fn flush(&mut self) -> io::Result<()> { self.staged.flush() }
}

impl EntryWrite for LockedWriter {
    fn commit(self: Box<Self>) -> CacheResult<()> {
        let LockedWriter {
            staged,
            target,
            sync,
            _lock,
        } = *self;
        staged.commit(&target, sync)?;
        Ok(())
    }
}

impl CacheProvider for FileCacheProvider {
    fn open_reader(&self, resource: &Resource) -> CacheResult<EntryReader> {
        let lock = self.lock(resource, LockMode::Shared)?;
        let path = self.mapping.path_for(resource);
        if !path.is_file() {
            return Err(CacheError::NotFound(path));
        }

        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CacheError::NotFound(path.clone()),
            _ => CacheError::io(&path, e),
        })?;
        Ok(Box::new(LockedReader {
            file:  BufReader::new(file),
            _lock: lock,
        }))
    }

    fn open_writer(&self, resource: &Resource) -> CacheResult<EntryWriter> {
        let lock = self.lock(resource, LockMode::Exclusive)?;
        let target = self.mapping.path_for(resource);
        let staged = StagedFile::new_in(parent_dir(&target)?)?;
        Ok(Box::new(LockedWriter {
            staged,
            target,
            sync: self.sync,
            _lock: lock,
        }))
    }

    fn exists(&self, resource: &Resource) -> bool { self.mapping.path_for(resource).exists() }

    fn is_directory(&self, resource: &Resource) -> bool { self.mapping.path_for(resource).is_dir() }

    fn list(&self, resource: &Resource) -> CacheResult<Vec<String>> {
        Ok(lading_fs::list_dir(self.mapping.path_for(resource))?)
    }

    fn delete(&self, resource: &Resource) -> CacheResult<bool> {
        let lock = self.lock(resource, LockMode::Exclusive)?;
        let path = self.mapping.path_for(resource);
        let nested = if path.is_dir() {
            self.files_under(resource)?
        } else {
            Vec::new()
        };

        let removed = lading_fs::remove_path(&path)?;
        lock.remove()?;
        self.remove_locks(&nested)?;
        Ok(removed)
    }

    fn copy(&self, from: &Resource, to: &Resource) -> CacheResult<()> {
        self.copy_from(self, from, to, |_| Ok(())).map(|_| ())
    }

    fn file_path(&self, resource: &Resource) -> PathBuf { self.mapping.path_for(resource) }
}
