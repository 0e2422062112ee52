use std::io::{Read, Write};
use std::path::PathBuf;

use lading_core::Resource;

use crate::CacheResult;

/// Reader over a committed cache entry; holds the entry's shared lock.
pub type EntryReader = Box<dyn Read + Send>;

/// Writer over a staged cache entry.
///
/// Bytes become visible under the entry's name only on [`commit`]. Dropping
/// the writer without committing discards the staged bytes and releases the
/// entry lock.
///
/// [`commit`]: EntryWrite::commit
pub trait EntryWrite: Write + Send {
    fn commit(self: Box<Self>) -> CacheResult<()>;
}

pub type EntryWriter = Box<dyn EntryWrite>;

/// Storage backend for cached content, addressed by [`Resource`].
///
/// Implementations serialize access per entry: readers share, writers,
/// copies into an entry and deletes are exclusive. Operations on distinct
/// entries never wait on each other.
pub trait CacheProvider: Send + Sync {
    /// Fails with [`CacheError::NotFound`](crate::CacheError::NotFound) when absent.
    fn open_reader(&self, resource: &Resource) -> CacheResult<EntryReader>;

    fn open_writer(&self, resource: &Resource) -> CacheResult<EntryWriter>;

    fn exists(&self, resource: &Resource) -> bool;

    fn is_directory(&self, resource: &Resource) -> bool;

    /// Sorted child names; empty for absent entries.
    fn list(&self, resource: &Resource) -> CacheResult<Vec<String>>;

    /// Returns `false` when nothing was there.
    fn delete(&self, resource: &Resource) -> CacheResult<bool>;

    fn copy(&self, from: &Resource, to: &Resource) -> CacheResult<()>;

    /// Where the entry lives on disk, for diagnostics.
    fn file_path(&self, resource: &Resource) -> PathBuf;
}
