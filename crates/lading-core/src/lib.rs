//! Shared model and runtime pieces for Lading.
//!
//! Everything else in the workspace keys off the types defined here:
//!
//! - [`Location`] - a remote endpoint plus its capability flags and TLS/proxy material
//! - [`Resource`] - a location plus a normalized relative path; the join/lock key
//! - [`TransferError`] / [`ErrorKind`] - the error taxonomy shared by every layer
//! - [`WorkerPool`] - bounded executor for publish, download and sync jobs
//! - [`NotFoundCache`], [`UsageCache`], [`PasswordManager`] - externally supplied stores

mod error;
mod location;
mod nfc;
mod password;
mod pool;
mod resource;
mod usage;

pub use error::{ErrorKind, Result, TransferError};
pub use location::{DEFAULT_PROXY_PORT, Location, LocationBuilder};
pub use nfc::{DEFAULT_NOT_FOUND_TTL, MemoryNotFoundCache, NotFoundCache};
pub use password::{MemoryPasswordManager, PasswordEntry, PasswordKind, PasswordManager};
pub use pool::{DEFAULT_WORKERS, WorkerPool};
pub use resource::{Resource, normalize_path};
pub use usage::{MemoryUsageCache, UsageCache};
