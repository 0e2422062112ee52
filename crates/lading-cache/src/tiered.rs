//! Two-tier cache: a fast local tier in front of a shared durable one.
//!
//! Reads are served from the fast tier, pulling entries through from the
//! durable tier on a miss. Writes land on the fast tier and are pushed to the
//! durable tier in the background by the worker pool. The usage cache records,
//! per cache path, which fast-tier content the durable tier is known to hold;
//! only entries covered by such a record may be evicted from the fast tier.
//!
//! Records are written while the entry's locks are still held, and deletes
//! take each entry's locks in turn, so a push racing a delete either lands
//! before the delete removes it or finds nothing to push.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lading_core::{Resource, UsageCache, WorkerPool};
use serde::{Deserialize, Serialize};

use crate::file::EntryStat;
use crate::{
    CacheError, CacheProvider, CacheResult, EntryReader, EntryWrite, EntryWriter, FileCacheProvider,
    PathMapping,
};

/// Fast-tier content that the durable tier is known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarker {
    pub length:           u64,
    pub modified_millis:  u64,
    pub synced_at_millis: u64,
}

impl SyncMarker {
    fn from_stat(stat: EntryStat) -> Self {
        let synced_at_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            length: stat.length,
            modified_millis: stat.modified_millis,
            synced_at_millis,
        }
    }

    /// Whether the durable copy this marker describes covers `fast`.
    pub fn covers(&self, fast: &EntryStat) -> bool {
        self.length == fast.length && self.modified_millis >= fast.modified_millis
    }
}

#[derive(Debug, Default)]
struct PushState {
    generation: u64,
}

struct Tiers {
    fast:    FileCacheProvider,
    durable: FileCacheProvider,
    usage:   Arc<dyn UsageCache>,
    pool:    WorkerPool,
    pushes:  DashMap<String, PushState>,
}

/// Cache provider layering a fast [`FileCacheProvider`] over a durable one.
#[derive(Clone)]
pub struct TieredCacheProvider {
    tiers: Arc<Tiers>,
}

impl TieredCacheProvider {
    pub fn new(
        fast: FileCacheProvider,
        durable: FileCacheProvider,
        usage: Arc<dyn UsageCache>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            tiers: Arc::new(Tiers {
                fast,
                durable,
                usage,
                pool,
                pushes: DashMap::new(),
            }),
        }
    }

    pub fn fast(&self) -> &FileCacheProvider { &self.tiers.fast }

    pub fn durable(&self) -> &FileCacheProvider { &self.tiers.durable }

    /// Paths with a push to the durable tier scheduled or running.
    pub fn pending_pushes(&self) -> usize { self.tiers.pushes.len() }

    pub fn sync_marker(&self, resource: &Resource) -> Option<SyncMarker> {
        self.tiers.marker(&PathMapping::relative(resource))
    }

    /// Drop the fast-tier copy if the durable tier holds the same content.
    ///
    /// Returns `false`, leaving the entry in place, when there is no fast copy
    /// or nothing shows the durable tier has caught up with it.
    pub fn evict(&self, resource: &Resource) -> CacheResult<bool> {
        let key = PathMapping::relative(resource);
        let Some(marker) = self.tiers.marker(&key) else {
            tracing::debug!(resource = %resource, "not evicting unsynced entry");
            return Ok(false);
        };

        let evicted = self.tiers.fast.delete_if(resource, |stat| marker.covers(&stat))?;
        if evicted {
            tracing::debug!(resource = %resource, "evicted fast-tier copy");
        }
        Ok(evicted)
    }
}

impl Tiers {
    fn marker(&self, key: &str) -> Option<SyncMarker> {
        let raw = self.usage.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable sync marker");
                self.usage.remove(key);
                None
            }
        }
    }

    fn record(&self, key: &str, stat: EntryStat) -> CacheResult<()> {
        let marker = serde_json::to_string(&SyncMarker::from_stat(stat))
            .map_err(|e| CacheError::Usage(e.to_string()))?;
        self.usage.put(key, marker);
        Ok(())
    }

    /// Copy a durable-only entry into the fast tier.
    fn pull_through(&self, resource: &Resource) -> CacheResult<()> {
        let key = PathMapping::relative(resource);
        let target = self
            .fast
            .copy_from(&self.durable, resource, resource, |target| self.record(&key, target))?;
        tracing::debug!(resource = %resource, length = target.length, "pulled through from durable tier");
        Ok(())
    }

    fn ensure_fast(&self, resource: &Resource) -> CacheResult<()> {
        if self.fast.exists(resource) {
            return Ok(());
        }
        if self.durable.exists(resource) {
            return self.pull_through(resource);
        }
        Err(CacheError::NotFound(self.fast.file_path(resource)))
    }

    fn push(&self, resource: &Resource, key: &str) -> CacheResult<()> {
        let source = self
            .fast
            .push_to(&self.durable, resource, |source| self.record(key, source))?;
        tracing::debug!(resource = %resource, length = source.length, "pushed to durable tier");
        Ok(())
    }

    /// Files below `dir` in either tier.
    fn entries_under(&self, dir: &Resource) -> CacheResult<Vec<Resource>> {
        let mut entries = BTreeMap::new();
        for entry in self.fast.files_under(dir)?.into_iter().chain(self.durable.files_under(dir)?) {
            entries.insert(PathMapping::relative(&entry), entry);
        }
        Ok(entries.into_values().collect())
    }

    /// Delete one path from both tiers, fast first, then forget its marker.
    fn delete_entry(&self, resource: &Resource) -> CacheResult<bool> {
        let fast = self.fast.delete(resource)?;
        let durable = self.durable.delete(resource)?;
        self.usage.remove(&PathMapping::relative(resource));
        Ok(fast || durable)
    }

    /// Note a fast-tier commit and make sure a push will pick it up.
    fn schedule_push(self: &Arc<Self>, resource: &Resource) {
        let key = PathMapping::relative(resource);
        let start = match self.pushes.entry(key.clone()) {
            Entry::Occupied(mut running) => {
                running.get_mut().generation += 1;
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(PushState { generation: 1 });
                true
            }
        };
        if !start {
            return;
        }

        let tiers = Arc::clone(self);
        let resource = resource.clone();
        self.pool.submit_blocking(move || tiers.push_until_current(&resource, &key));
    }

    /// Push until no commit landed while the last push was running.
    fn push_until_current(&self, resource: &Resource, key: &str) {
        loop {
            let Some(generation) = self.pushes.get(key).map(|s| s.generation) else {
                return;
            };

            match self.push(resource, key) {
                Ok(()) => {}
                Err(CacheError::NotFound(_)) => {
                    tracing::debug!(resource = %resource, "entry gone before push");
                }
                Err(e) => {
                    tracing::warn!(resource = %resource, error = %e, "push to durable tier failed");
                }
            }

            if self
                .pushes
                .remove_if(key, |_, state| state.generation == generation)
                .is_some()
            {
                return;
            }
        }
    }
}

struct TieredWriter {
    inner:    EntryWriter,
    tiers:    Arc<Tiers>,
    resource: Resource,
}

impl Write for TieredWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.inner.write(buf) }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

impl EntryWrite for TieredWriter {
    fn commit(self: Box<Self>) -> CacheResult<()> {
        let TieredWriter {
            inner,
            tiers,
            resource,
        } = *self;
        inner.commit()?;
        tiers.schedule_push(&resource);
        Ok(())
    }
}

impl CacheProvider for TieredCacheProvider {
    fn open_reader(&self, resource: &Resource) -> CacheResult<EntryReader> {
        self.tiers.ensure_fast(resource)?;
        self.tiers.fast.open_reader(resource)
    }

    fn open_writer(&self, resource: &Resource) -> CacheResult<EntryWriter> {
        let inner = self.tiers.fast.open_writer(resource)?;
        Ok(Box::new(TieredWriter {
            inner,
            tiers: Arc::clone(&self.tiers),
            resource: resource.clone(),
        }))
    }

    fn exists(&self, resource: &Resource) -> bool {
        self.tiers.fast.exists(resource) || self.tiers.durable.exists(resource)
    }

    fn is_directory(&self, resource: &Resource) -> bool {
        self.tiers.fast.is_directory(resource) || self.tiers.durable.is_directory(resource)
    }

    fn list(&self, resource: &Resource) -> CacheResult<Vec<String>> {
        let mut names: BTreeSet<String> = self.tiers.fast.list(resource)?.into_iter().collect();
        names.extend(self.tiers.durable.list(resource)?);
        Ok(names.into_iter().collect())
    }

    /// Entries below a directory are deleted one by one under their own
    /// locks before the directory itself goes.
    fn delete(&self, resource: &Resource) -> CacheResult<bool> {
        let mut removed = false;
        for entry in self.tiers.entries_under(resource)? {
            removed |= self.tiers.delete_entry(&entry)?;
        }
        removed |= self.tiers.delete_entry(resource)?;
        Ok(removed)
    }

    fn copy(&self, from: &Resource, to: &Resource) -> CacheResult<()> {
        self.tiers.ensure_fast(from)?;
        self.tiers.fast.copy(from, to)?;
        self.tiers.schedule_push(to);
        Ok(())
    }

    fn file_path(&self, resource: &Resource) -> PathBuf { self.tiers.fast.file_path(resource) }
}
