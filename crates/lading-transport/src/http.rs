use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use lading_cache::{ChecksumConfig, ChecksumGeneratorFactory, Transfer};
use lading_core::{
    Location, PasswordEntry, PasswordKind, PasswordManager, Resource, Result, TransferError,
};
use reqwest::{Client, Proxy, RequestBuilder, Response};
use sha2::{Digest, Sha256};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::{
    DownloadJob, ExistsJob, HttpConfig, HttpDownload, HttpExistence, HttpPublish, PublishJob, Transport,
    tls,
};

/// HTTP(S) transport binding per-location credentials and TLS material to
/// every request it executes.
///
/// Cloning is cheap; clones share the client cache and the connection bound.
#[derive(Clone)]
pub struct HttpTransport {
    config:          Arc<HttpConfig>,
    passwords:       Arc<dyn PasswordManager>,
    clients:         Arc<DashMap<String, Client>>,
    permits:         Arc<Semaphore>,
    checksums:       Arc<[ChecksumGeneratorFactory]>,
    checksum_config: ChecksumConfig,
}

/// A response plus the connection slot it occupies.
///
/// The slot returns to the pool when the exchange is dropped, whatever the
/// outcome of the request.
pub struct Exchange {
    pub response: Response,
    _slot:        ConnectionSlot,
}

struct ConnectionSlot {
    _permit: OwnedSemaphorePermit,
    url:     Url,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        tracing::trace!(url = %self.url, "connection slot released");
    }
}

impl HttpTransport {
    pub fn new(config: HttpConfig, passwords: Arc<dyn PasswordManager>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            config: Arc::new(config),
            passwords,
            clients: Arc::new(DashMap::new()),
            permits,
            checksums: Arc::from(Vec::new()),
            checksum_config: ChecksumConfig::default(),
        }
    }

    /// Digests computed for every downloaded entry.
    pub fn with_checksums(mut self, factories: Vec<ChecksumGeneratorFactory>, config: ChecksumConfig) -> Self {
        self.checksums = Arc::from(factories);
        self.checksum_config = config;
        self
    }

    pub fn config(&self) -> &HttpConfig { &self.config }

    pub(crate) fn checksums(&self) -> (&[ChecksumGeneratorFactory], &ChecksumConfig) {
        (&self.checksums, &self.checksum_config)
    }

    /// Requests currently holding a connection slot.
    pub fn in_flight(&self) -> usize { self.config.max_connections.max(1) - self.permits.available_permits() }

    /// Client for `location`, built on first use.
    ///
    /// Clients are memoized by uri together with a fingerprint of the
    /// location's TLS material and proxy, so two locations sharing a uri but
    /// not their settings never share a client.
    pub fn client_for(&self, location: &Location) -> Result<Client> {
        let key = client_key(location);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = self.build_client(location)?;
        Ok(self.clients.entry(key).or_insert(client).clone())
    }

    fn build_client(&self, location: &Location) -> Result<Client> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(self.config.max_connections)
            .pool_idle_timeout(self.config.idle_timeout)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent.clone());

        if location.has_tls_material() {
            let key_password = self.passwords.password(&PasswordEntry::new(location, PasswordKind::Key));
            builder = tls::apply(location, builder, key_password.as_deref())?;
        }

        if let Some(proxy_url) = location.proxy() {
            let invalid_proxy = |reason: &str| {
                TransferError::configuration(location.uri().as_str(), format!("invalid proxy {proxy_url}: {reason}"))
            };

            let mut target = proxy_url.clone();
            if target.port().is_none() {
                // the default proxy port is not the scheme's default
                target
                    .set_port(location.proxy_port())
                    .map_err(|()| invalid_proxy("cannot carry a port"))?;
            }
            target
                .set_username("")
                .and_then(|()| target.set_password(None))
                .map_err(|()| invalid_proxy("cannot carry credentials"))?;

            let mut proxy = Proxy::all(target.as_str()).map_err(|e| invalid_proxy(&e.to_string()))?;
            if let Some(user) = location.proxy_user() {
                let password = self
                    .passwords
                    .password(&PasswordEntry::new(location, PasswordKind::Proxy))
                    .unwrap_or_default();
                proxy = proxy.basic_auth(user, &password);
            }
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| {
            TransferError::configuration(location.uri().as_str(), format!("cannot build HTTP client: {e}"))
        })
    }

    /// Execute one request for `location`.
    ///
    /// Waits for a connection slot, then builds the request on the location's
    /// client and binds the location's basic credentials to it. `build`
    /// receives `url` without user info; credentials only travel through the
    /// binding, which does not outlive the call.
    pub async fn execute(
        &self,
        location: &Location,
        url: &Url,
        build: impl FnOnce(&Client, Url) -> RequestBuilder,
    ) -> Result<Exchange> {
        let client = self.client_for(location)?;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| TransferError::Interrupted {
                resource:  url.to_string(),
                operation: "waiting for a connection",
                reason:    "transport shut down".to_string(),
            })?;
        let slot = ConnectionSlot {
            _permit: permit,
            url:     url.clone(),
        };

        let mut bare = url.clone();
        let _ = bare.set_username("");
        let _ = bare.set_password(None);

        let mut request = build(&client, bare);
        if let Some(user) = location.user() {
            let password = self.passwords.password(&PasswordEntry::new(location, PasswordKind::User));
            request = request.basic_auth(user, password);
        }

        let response = request.send().await.map_err(|e| {
            TransferError::Upstream {
                target: url.to_string(),
                reason: format!("Repository remote request failed: {e}"),
                status: e.status().map(|s| s.as_u16()),
                source: Some(Arc::new(e)),
            }
        })?;

        Ok(Exchange {
            response,
            _slot: slot,
        })
    }
}

/// Memo key: the uri plus a digest of every setting a client is built from.
fn client_key(location: &Location) -> String {
    let mut hasher = Sha256::new();
    for setting in [
        location.key_cert_pem(),
        location.server_cert_pem(),
        location.proxy().map(Url::as_str),
    ] {
        match setting {
            Some(value) => {
                hasher.update([1]);
                hasher.update((value.len() as u64).to_le_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0]),
        }
    }
    format!("{}#{}", location.uri(), hex::encode(hasher.finalize()))
}

impl Transport for HttpTransport {
    fn handles(&self, location: &Location) -> bool { matches!(location.uri().scheme(), "http" | "https") }

    fn create_publish_job(
        &self,
        resource: &Resource,
        body: Bytes,
        content_type: Option<String>,
    ) -> Result<Box<dyn PublishJob>> {
        Ok(Box::new(HttpPublish::new(self.clone(), resource.clone(), body, content_type)?))
    }

    fn create_download_job(&self, transfer: &Transfer) -> Result<Box<dyn DownloadJob>> {
        Ok(Box::new(HttpDownload::new(self.clone(), transfer.clone())?))
    }

    fn create_exists_job(&self, resource: &Resource) -> Result<Box<dyn ExistsJob>> {
        Ok(Box::new(HttpExistence::new(self.clone(), resource.clone())?))
    }
}
