//! Lading fetches artifacts from remote repositories on demand, keeps them in
//! a local (optionally tiered) cache and publishes content back.
//!
//! This crate assembles the pieces from configuration:
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use lading::{Lading, LadingConfig};
//!
//! lading::init_tracing("lading=info");
//! let config = LadingConfig::load(Some("lading.toml".as_ref()))?;
//! let engine = Lading::from_config(&config)?;
//!
//! if let Some(resource) = engine.resource("central", "org/foo/foo-1.0.pom") {
//!     if let Some(transfer) = engine.manager().retrieve(&resource).await? {
//!         println!("cached at {}", transfer.path().display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod engine;
mod error;
mod logging;

pub use config::{CacheSection, HttpSection, LadingConfig, LocationConfig, TransferSection};
pub use engine::Lading;
pub use error::{ConfigError, Result};
pub use logging::init_tracing;

pub use lading_cache::{CacheProvider, Transfer};
pub use lading_core::{ErrorKind, Location, Resource, TransferError};
pub use lading_xfer::TransferManager;
