use std::collections::BTreeMap;
use std::sync::Arc;

use lading_cache::{CacheProvider, ChecksumConfig, FileCacheProvider, TieredCacheProvider, factories};
use lading_core::{
    Location, MemoryNotFoundCache, MemoryPasswordManager, MemoryUsageCache, NotFoundCache, PasswordKind, Resource,
    WorkerPool,
};
use lading_transport::HttpTransport;
use lading_xfer::TransferManager;
use tokio::runtime::Handle;

use crate::config::LadingConfig;
use crate::error::{ConfigError, Result};

/// A fully wired engine: caches, transport, coordinators and the named
/// locations they serve.
pub struct Lading {
    pool:      WorkerPool,
    nfc:       Arc<MemoryNotFoundCache>,
    locations: BTreeMap<String, Arc<Location>>,
    manager:   TransferManager,
}

impl Lading {
    /// Assemble on the runtime of the calling task.
    pub fn from_config(config: &LadingConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Self::from_config_on(config, handle)
    }

    pub fn from_config_on(config: &LadingConfig, handle: Handle) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::new(handle, config.transfers.workers);
        let nfc = Arc::new(MemoryNotFoundCache::with_ttl(config.transfers.not_found_ttl()));
        let passwords = Arc::new(MemoryPasswordManager::new());

        let mut locations = BTreeMap::new();
        for entry in &config.locations {
            let location = Arc::new(entry.to_location()?);
            if let Some(password) = &entry.password {
                passwords.bind(&location, PasswordKind::User, password.as_str());
            }
            if let Some(password) = &entry.proxy_password {
                passwords.bind(&location, PasswordKind::Proxy, password.as_str());
            }
            if let Some(password) = &entry.key_password {
                passwords.bind(&location, PasswordKind::Key, password.as_str());
            }
            locations.insert(entry.name().to_string(), location);
        }

        let algorithms = config.cache.algorithms()?;
        let checksum_config = ChecksumConfig::new(config.cache.write_checksum_files);

        let fast = FileCacheProvider::new(&config.cache.root);
        let cache: Arc<dyn CacheProvider> = match &config.cache.durable_root {
            Some(durable) => {
                tracing::debug!(
                    fast = %config.cache.root.display(),
                    durable = %durable.display(),
                    "using tiered cache"
                );
                Arc::new(TieredCacheProvider::new(
                    fast,
                    FileCacheProvider::new(durable),
                    Arc::new(MemoryUsageCache::new()),
                    pool.clone(),
                ))
            }
            None => Arc::new(fast),
        };

        let transport = HttpTransport::new(config.http.to_http_config(), passwords)
            .with_checksums(factories(&algorithms), checksum_config.clone());

        let manager = TransferManager::new(cache, pool.clone(), Arc::clone(&nfc) as Arc<dyn NotFoundCache>)
            .transport(Arc::new(transport))
            .checksums(factories(&algorithms), checksum_config)
            .timeout(config.transfers.timeout());

        tracing::info!(
            locations = locations.len(),
            workers = pool.size(),
            cache = %config.cache.root.display(),
            "lading engine ready"
        );

        Ok(Self {
            pool,
            nfc,
            locations,
            manager,
        })
    }

    pub fn manager(&self) -> &TransferManager { &self.manager }

    pub fn pool(&self) -> &WorkerPool { &self.pool }

    pub fn not_found(&self) -> &MemoryNotFoundCache { &self.nfc }

    pub fn location(&self, name: &str) -> Option<&Arc<Location>> { self.locations.get(name) }

    pub fn locations(&self) -> impl Iterator<Item = (&str, &Arc<Location>)> {
        self.locations.iter().map(|(name, location)| (name.as_str(), location))
    }

    /// `path` within the location configured under `name`.
    pub fn resource(&self, name: &str, path: &str) -> Option<Resource> {
        self.location(name).map(|location| Resource::new(Arc::clone(location), path))
    }
}
