//! Transfer manager - the cache and the network behind one entry point.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lading_cache::{
    CacheError, CacheProvider, ChecksumConfig, ChecksumGeneratorFactory, ChecksummingWriter, EntryWrite,
    ReadOnceReader, Transfer,
};
use lading_core::{Location, NotFoundCache, Resource, Result, TransferError, WorkerPool};
use lading_transport::Transport;

use crate::download::DownloadCoordinator;
use crate::pending::join_result;
use crate::upload::UploadCoordinator;

/// Default bound on every wait the manager performs.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Routes reads through the cache and misses, writes and existence checks to the
/// transport that handles the resource's location.
pub struct TransferManager {
    cache:      Arc<dyn CacheProvider>,
    transports: Vec<Arc<dyn Transport>>,
    uploads:    UploadCoordinator,
    downloads:  DownloadCoordinator,
    nfc:        Arc<dyn NotFoundCache>,
    pool:       WorkerPool,
    checksums:  Arc<[ChecksumGeneratorFactory]>,
    config:     ChecksumConfig,
    timeout:    Duration,
}

impl TransferManager {
    pub fn new(cache: Arc<dyn CacheProvider>, pool: WorkerPool, nfc: Arc<dyn NotFoundCache>) -> Self {
        Self {
            cache,
            transports: Vec::new(),
            uploads: UploadCoordinator::new(pool.clone(), Arc::clone(&nfc)),
            downloads: DownloadCoordinator::new(pool.clone(), Arc::clone(&nfc)),
            nfc,
            pool,
            checksums: Arc::from(Vec::new()),
            config: ChecksumConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Register a transport; the first one that handles a location wins.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Digests computed when content is stored by [`publish`](Self::publish).
    pub fn checksums(mut self, factories: Vec<ChecksumGeneratorFactory>, config: ChecksumConfig) -> Self {
        self.checksums = Arc::from(factories);
        self.config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration { self.timeout }

    pub fn cache(&self) -> &Arc<dyn CacheProvider> { &self.cache }

    pub fn uploads(&self) -> &UploadCoordinator { &self.uploads }

    pub fn downloads(&self) -> &DownloadCoordinator { &self.downloads }

    /// Cache-side handle of `resource`; nothing is fetched.
    pub fn transfer(&self, resource: &Resource) -> Transfer { Transfer::new(resource.clone(), Arc::clone(&self.cache)) }

    fn transport_for(&self, location: &Location) -> Result<&dyn Transport> {
        self.transports
            .iter()
            .find(|t| t.handles(location))
            .map(|t| &**t)
            .ok_or_else(|| TransferError::configuration(location.uri().as_str(), "no transport handles this location"))
    }

    /// Run cache work on the pool, bounded by the default timeout.
    async fn blocking<T, F>(&self, resource: &Resource, operation: &'static str, work: F) -> Result<T>
    where
        F: FnOnce() -> std::result::Result<T, CacheError> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.pool.submit_blocking(move || work().map_err(TransferError::from));
        let joined = tokio::time::timeout(self.timeout, handle).await;
        join_result(joined, self.timeout, resource, operation)
    }

    /// The cached entry, downloading it first on a miss.
    pub async fn retrieve(&self, resource: &Resource) -> Result<Option<Transfer>> {
        let transfer = self.transfer(resource);
        let cached = transfer.clone();
        if self.blocking(resource, "checking the cache", move || Ok(cached.exists())).await? {
            tracing::debug!(resource = %resource, "cache hit");
            return Ok(Some(transfer));
        }

        let transport = self.transport_for(resource.location())?;
        self.downloads.download(&transfer, self.timeout, transport).await
    }

    /// Like [`retrieve`](Self::retrieve), but the entry is deleted once the
    /// returned reader is closed or dropped.
    pub async fn retrieve_once(&self, resource: &Resource) -> Result<Option<ReadOnceReader>> {
        let Some(transfer) = self.retrieve(resource).await? else {
            return Ok(None);
        };
        let reader = self
            .blocking(resource, "opening a cached entry", move || ReadOnceReader::open(transfer))
            .await?;
        Ok(Some(reader))
    }

    /// Store `body` locally (when the location allows it), then upload it.
    pub async fn publish(&self, resource: &Resource, body: Bytes, content_type: Option<String>) -> Result<bool> {
        if !resource.allows_publishing() {
            return Err(TransferError::Disallowed {
                resource: resource.to_string(),
            });
        }
        let transport = self.transport_for(resource.location())?;

        if resource.allows_storing() {
            let transfer = self.transfer(resource);
            let factories = Arc::clone(&self.checksums);
            let config = self.config.clone();
            let content = body.clone();
            self.blocking(resource, "storing", move || {
                let mut writer = ChecksummingWriter::open(&transfer, &factories, &config)?;
                writer
                    .write_all(&content)
                    .map_err(|e| CacheError::io(transfer.path(), e))?;
                Box::new(writer).commit()
            })
            .await?;
            tracing::debug!(resource = %resource, bytes = body.len(), "stored before publishing");
        }

        self.uploads
            .upload(resource, body, content_type, self.timeout, transport)
            .await
    }

    /// Whether `resource` is cached or, failing that, present upstream.
    pub async fn exists(&self, resource: &Resource) -> Result<bool> {
        let cached = self.transfer(resource);
        if self.blocking(resource, "checking the cache", move || Ok(cached.exists())).await? {
            return Ok(true);
        }
        if self.nfc.is_missing(resource) {
            return Ok(false);
        }

        let mut job = self.transport_for(resource.location())?.create_exists_job(resource)?;
        let handle = self.pool.submit(async move { job.run().await });
        let joined = tokio::time::timeout(self.timeout, handle).await;
        let exists = join_result(joined, self.timeout, resource, "probing")?;
        if !exists {
            self.nfc.add_missing(resource);
        }
        Ok(exists)
    }

    /// Remove the cached entry and its siblings.
    pub async fn delete(&self, resource: &Resource) -> Result<bool> {
        let transfer = self.transfer(resource);
        self.blocking(resource, "deleting", move || transfer.delete()).await
    }

    /// Names of the cached children of `resource`.
    pub async fn list(&self, resource: &Resource) -> Result<Vec<String>> {
        let transfer = self.transfer(resource);
        self.blocking(resource, "listing", move || transfer.list()).await
    }
}
