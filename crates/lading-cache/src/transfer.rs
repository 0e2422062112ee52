use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use lading_core::Resource;
use lading_verify::DigestAlgorithm;

use crate::{CacheError, CacheProvider, CacheResult, EntryReader, EntryWriter};

/// Sibling holding the headers of the HTTP exchange that produced an entry.
pub const HTTP_METADATA_SUFFIX: &str = ".http-metadata.json";

/// Suffixes of every sibling a transfer may own.
pub fn sibling_suffixes() -> impl Iterator<Item = &'static str> {
    DigestAlgorithm::ALL
        .into_iter()
        .map(|a| a.suffix())
        .chain(std::iter::once(HTTP_METADATA_SUFFIX))
}

/// A resource bound to the cache provider holding it.
#[derive(Clone)]
pub struct Transfer {
    resource: Resource,
    provider: Arc<dyn CacheProvider>,
}

impl Transfer {
    pub fn new(resource: Resource, provider: Arc<dyn CacheProvider>) -> Self {
        Self { resource, provider }
    }

    pub fn resource(&self) -> &Resource { &self.resource }

    pub fn provider(&self) -> &Arc<dyn CacheProvider> { &self.provider }

    pub fn path(&self) -> PathBuf { self.provider.file_path(&self.resource) }

    pub fn exists(&self) -> bool { self.provider.exists(&self.resource) }

    pub fn is_directory(&self) -> bool { self.provider.is_directory(&self.resource) }

    pub fn list(&self) -> CacheResult<Vec<String>> { self.provider.list(&self.resource) }

    pub fn open_reader(&self) -> CacheResult<EntryReader> { self.provider.open_reader(&self.resource) }

    pub fn open_writer(&self) -> CacheResult<EntryWriter> { self.provider.open_writer(&self.resource) }

    /// Entry stored next to this one under `suffix`, in the same provider.
    pub fn sibling(&self, suffix: &str) -> Transfer {
        Transfer::new(self.resource.sibling(suffix), Arc::clone(&self.provider))
    }

    pub fn metadata(&self) -> Transfer { self.sibling(HTTP_METADATA_SUFFIX) }

    pub fn parent(&self) -> Option<Transfer> {
        self.resource
            .parent()
            .map(|parent| Transfer::new(parent, Arc::clone(&self.provider)))
    }

    pub fn child(&self, name: &str) -> Transfer {
        Transfer::new(self.resource.child(name), Arc::clone(&self.provider))
    }

    pub fn read_to_vec(&self) -> CacheResult<Vec<u8>> {
        let mut reader = self.open_reader()?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| CacheError::io(self.path(), e))?;
        Ok(buf)
    }

    /// Replace the entry with `content` in a single commit.
    pub fn write_all(&self, content: &[u8]) -> CacheResult<()> {
        let mut writer = self.open_writer()?;
        writer
            .write_all(content)
            .map_err(|e| CacheError::io(self.path(), e))?;
        writer.commit()
    }

    pub fn copy_to(&self, target: &Resource) -> CacheResult<Transfer> {
        self.provider.copy(&self.resource, target)?;
        Ok(Transfer::new(target.clone(), Arc::clone(&self.provider)))
    }

    /// Delete the entry and every sibling it owns.
    ///
    /// All siblings are attempted even when one fails; the first failure is
    /// returned. The result reports whether the primary entry existed.
    pub fn delete(&self) -> CacheResult<bool> {
        let mut first_error = None;

        let existed = match self.provider.delete(&self.resource) {
            Ok(existed) => existed,
            Err(e) => {
                first_error = Some(e);
                false
            }
        };

        for suffix in sibling_suffixes() {
            let sibling = self.resource.sibling(suffix);
            if !self.provider.exists(&sibling) {
                continue;
            }
            if let Err(e) = self.provider.delete(&sibling) {
                tracing::warn!(resource = %sibling, error = %e, "failed to delete sibling entry");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(existed),
        }
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("resource", &self.resource)
            .field("path", &self.path())
            .finish()
    }
}

impl std::fmt::Display for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource)
    }
}
