use std::hash::{Hash, Hasher};

use url::Url;

use crate::error::{Result, TransferError};

/// Port assumed for a proxy uri that does not name one.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// A remote repository endpoint.
///
/// Immutable once built; resources share it through an `Arc`. Equality and
/// hashing use the endpoint uri only, so two configurations pointing at the same
/// uri address the same cache entries.
#[derive(Debug, Clone)]
pub struct Location {
    name:             String,
    uri:              Url,
    allow_snapshots:  bool,
    allow_releases:   bool,
    allows_storing:   bool,
    allow_publishing: bool,
    proxy:            Option<Url>,
    key_cert_pem:     Option<String>,
    server_cert_pem:  Option<String>,
}

impl Location {
    /// Location with default policy: releases and storing allowed, no publishing.
    pub fn new(uri: &str) -> Result<Self> {
        Self::builder(uri).build()
    }

    pub fn builder(uri: impl Into<String>) -> LocationBuilder {
        LocationBuilder::new(uri)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn uri(&self) -> &Url { &self.uri }

    pub fn allow_snapshots(&self) -> bool { self.allow_snapshots }

    pub fn allow_releases(&self) -> bool { self.allow_releases }

    pub fn allows_storing(&self) -> bool { self.allows_storing }

    pub fn allow_publishing(&self) -> bool { self.allow_publishing }

    pub fn host(&self) -> Option<&str> { self.uri.host_str() }

    pub fn port(&self) -> Option<u16> { self.uri.port_or_known_default() }

    /// User embedded in the endpoint uri, if any.
    pub fn user(&self) -> Option<&str> {
        Some(self.uri.username()).filter(|u| !u.is_empty())
    }

    pub fn proxy(&self) -> Option<&Url> { self.proxy.as_ref() }

    pub fn proxy_host(&self) -> Option<&str> { self.proxy.as_ref().and_then(|p| p.host_str()) }

    pub fn proxy_port(&self) -> Option<u16> {
        self.proxy.as_ref().map(|p| p.port().unwrap_or(DEFAULT_PROXY_PORT))
    }

    pub fn proxy_user(&self) -> Option<&str> {
        self.proxy
            .as_ref()
            .map(|p| p.username())
            .filter(|u| !u.is_empty())
    }

    pub fn key_cert_pem(&self) -> Option<&str> { self.key_cert_pem.as_deref() }

    pub fn server_cert_pem(&self) -> Option<&str> { self.server_cert_pem.as_deref() }

    /// Whether requests to this location need TLS handling.
    pub fn is_tls(&self) -> bool {
        self.uri.scheme() == "https" || self.key_cert_pem.is_some() || self.server_cert_pem.is_some()
    }

    /// Whether this location carries its own TLS material.
    pub fn has_tls_material(&self) -> bool {
        self.key_cert_pem.is_some() || self.server_cert_pem.is_some()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool { self.uri == other.uri }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) { self.uri.as_str().hash(state); }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.uri.as_str().trim_end_matches('/'))
    }
}

/// Builder for [`Location`].
///
/// ```
/// use lading_core::Location;
///
/// let location = Location::builder("https://repo.example.com/releases")
///     .name("releases")
///     .allow_publishing(true)
///     .proxy("http://proxy.example.com")
///     .build()
///     .unwrap();
///
/// assert!(location.allow_publishing());
/// assert_eq!(location.proxy_port(), Some(8080));
/// ```
#[derive(Debug, Clone)]
pub struct LocationBuilder {
    uri:              String,
    name:             Option<String>,
    allow_snapshots:  bool,
    allow_releases:   bool,
    allows_storing:   bool,
    allow_publishing: bool,
    proxy:            Option<String>,
    key_cert_pem:     Option<String>,
    server_cert_pem:  Option<String>,
}

impl LocationBuilder {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri:              uri.into(),
            name:             None,
            allow_snapshots:  false,
            allow_releases:   true,
            allows_storing:   true,
            allow_publishing: false,
            proxy:            None,
            key_cert_pem:     None,
            server_cert_pem:  None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn allow_snapshots(mut self, allow: bool) -> Self {
        self.allow_snapshots = allow;
        self
    }

    pub fn allow_releases(mut self, allow: bool) -> Self {
        self.allow_releases = allow;
        self
    }

    pub fn allows_storing(mut self, allow: bool) -> Self {
        self.allows_storing = allow;
        self
    }

    pub fn allow_publishing(mut self, allow: bool) -> Self {
        self.allow_publishing = allow;
        self
    }

    pub fn proxy(mut self, proxy_uri: impl Into<String>) -> Self {
        self.proxy = Some(proxy_uri.into());
        self
    }

    pub fn key_cert_pem(mut self, pem: impl Into<String>) -> Self {
        self.key_cert_pem = Some(pem.into());
        self
    }

    pub fn server_cert_pem(mut self, pem: impl Into<String>) -> Self {
        self.server_cert_pem = Some(pem.into());
        self
    }

    pub fn build(self) -> Result<Location> {
        let uri = Url::parse(&self.uri).map_err(|e| {
            TransferError::configuration(&self.uri, format!("invalid location uri: {e}"))
        })?;

        let proxy = match self.proxy {
            Some(raw) => Some(Url::parse(&raw).map_err(|e| {
                TransferError::configuration(&self.uri, format!("invalid proxy uri {raw}: {e}"))
            })?),
            None => None,
        };

        Ok(Location {
            name: self.name.unwrap_or_else(|| self.uri.clone()),
            uri,
            allow_snapshots: self.allow_snapshots,
            allow_releases: self.allow_releases,
            allows_storing: self.allows_storing,
            allow_publishing: self.allow_publishing,
            proxy,
            key_cert_pem: self.key_cert_pem,
            server_cert_pem: self.server_cert_pem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_defaults() {
        let loc = Location::new("http://foo.com").unwrap();
        assert_eq!(loc.name(), "http://foo.com");
        assert!(loc.allow_releases());
        assert!(loc.allows_storing());
        assert!(!loc.allow_snapshots());
        assert!(!loc.allow_publishing());
        assert!(!loc.is_tls());
        assert_eq!(loc.port(), Some(80));
        assert_eq!(loc.proxy_host(), None);
    }

    #[test]
    fn test_uri_user_and_proxy() {
        let loc = Location::builder("https://deployer@repo.example.com:8443/releases")
            .proxy("http://squid@proxy.local")
            .build()
            .unwrap();

        assert_eq!(loc.user(), Some("deployer"));
        assert_eq!(loc.host(), Some("repo.example.com"));
        assert_eq!(loc.port(), Some(8443));
        assert!(loc.is_tls());
        assert_eq!(loc.proxy_host(), Some("proxy.local"));
        assert_eq!(loc.proxy_port(), Some(DEFAULT_PROXY_PORT));
        assert_eq!(loc.proxy_user(), Some("squid"));
    }

    #[test]
    fn test_equality_by_uri() {
        let a = Location::builder("http://foo.com").name("a").build().unwrap();
        let b = Location::builder("http://foo.com").name("b").allow_publishing(true).build().unwrap();
        let c = Location::new("http://bar.com").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_uri_is_configuration_error() {
        let err = Location::new("not a uri").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_pem_material_implies_tls() {
        let loc = Location::builder("http://foo.com")
            .server_cert_pem("-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n")
            .build()
            .unwrap();
        assert!(loc.is_tls());
        assert!(loc.has_tls_material());
    }
}
