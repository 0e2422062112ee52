//! Layered configuration.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `LADING_`-prefixed environment variables, `__` separating sections
//!    (`LADING_HTTP__MAX_CONNECTIONS=8`)

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use lading_core::{DEFAULT_NOT_FOUND_TTL, DEFAULT_WORKERS, Location};
use lading_transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, HttpConfig};
use lading_verify::DigestAlgorithm;
use lading_xfer::DEFAULT_TIMEOUT;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const ENV_PREFIX: &str = "LADING_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadingConfig {
    pub cache:     CacheSection,
    pub http:      HttpSection,
    pub transfers: TransferSection,
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub root:                 PathBuf,
    /// Setting this layers `root` as a fast tier over a durable one.
    pub durable_root:         Option<PathBuf>,
    /// Algorithm names such as `md5` or `SHA-256`.
    pub checksums:            Vec<String>,
    pub write_checksum_files: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            root:                 PathBuf::from(".lading/cache"),
            durable_root:         None,
            checksums:            vec!["md5".to_string(), "sha1".to_string()],
            write_checksum_files: true,
        }
    }
}

impl CacheSection {
    pub fn algorithms(&self) -> Result<Vec<DigestAlgorithm>> {
        self.checksums
            .iter()
            .map(|name| name.parse().map_err(ConfigError::from))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub max_connections:      usize,
    pub idle_timeout_secs:    u64,
    pub connect_timeout_secs: u64,
    pub user_agent:           Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            max_connections:      DEFAULT_MAX_CONNECTIONS,
            idle_timeout_secs:    DEFAULT_IDLE_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            user_agent:           None,
        }
    }
}

impl HttpSection {
    pub fn to_http_config(&self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            max_connections: self.max_connections.max(1),
            idle_timeout:    Duration::from_secs(self.idle_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            user_agent:      self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSection {
    pub workers:            usize,
    pub timeout_secs:       u64,
    pub not_found_ttl_secs: u64,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            workers:            DEFAULT_WORKERS,
            timeout_secs:       DEFAULT_TIMEOUT.as_secs(),
            not_found_ttl_secs: DEFAULT_NOT_FOUND_TTL.as_secs(),
        }
    }
}

impl TransferSection {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    pub fn not_found_ttl(&self) -> Duration { Duration::from_secs(self.not_found_ttl_secs) }
}

/// One remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Defaults to the uri.
    pub name:             Option<String>,
    pub uri:              String,
    pub allow_snapshots:  bool,
    pub allow_releases:   bool,
    pub allows_storing:   bool,
    pub allow_publishing: bool,
    pub proxy:            Option<String>,
    /// Client certificate chain plus its PKCS#8 key, PEM encoded.
    pub key_cert_pem:     Option<String>,
    pub server_cert_pem:  Option<String>,
    /// Password of the user named in `uri`.
    pub password:         Option<String>,
    /// Password of the user named in `proxy`.
    pub proxy_password:   Option<String>,
    /// Passphrase of an encrypted key in `key_cert_pem`.
    pub key_password:     Option<String>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name:             None,
            uri:              String::new(),
            allow_snapshots:  false,
            allow_releases:   true,
            allows_storing:   true,
            allow_publishing: false,
            proxy:            None,
            key_cert_pem:     None,
            server_cert_pem:  None,
            password:         None,
            proxy_password:   None,
            key_password:     None,
        }
    }
}

impl LocationConfig {
    pub fn name(&self) -> &str { self.name.as_deref().unwrap_or(&self.uri) }

    pub fn to_location(&self) -> Result<Location> {
        let mut builder = Location::builder(&self.uri)
            .name(self.name())
            .allow_snapshots(self.allow_snapshots)
            .allow_releases(self.allow_releases)
            .allows_storing(self.allows_storing)
            .allow_publishing(self.allow_publishing);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy);
        }
        if let Some(pem) = &self.key_cert_pem {
            builder = builder.key_cert_pem(pem);
        }
        if let Some(pem) = &self.server_cert_pem {
            builder = builder.server_cert_pem(pem);
        }
        builder.build().map_err(|source| ConfigError::Location {
            name: self.name().to_string(),
            source,
        })
    }
}

impl LadingConfig {
    /// Defaults, then `path` when it exists, then the environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration file");
                figment = figment.merge(Toml::file(path));
            } else {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> { Self::from_figment(Self::figment(path)) }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that assembling an engine from this configuration cannot fail
    /// on the configuration itself.
    pub fn validate(&self) -> Result<()> {
        self.cache.algorithms()?;
        let mut seen = HashSet::new();
        for location in &self.locations {
            location.to_location()?;
            if !seen.insert(location.name()) {
                return Err(ConfigError::DuplicateLocation(location.name().to_string()));
            }
        }
        Ok(())
    }

    /// The effective configuration, as TOML.
    pub fn to_toml(&self) -> Result<String> { Ok(toml::to_string_pretty(self)?) }
}
