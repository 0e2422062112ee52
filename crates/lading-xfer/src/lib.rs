//! Coordination of network transfers for Lading.
//!
//! [`UploadCoordinator`] and [`DownloadCoordinator`] keep at most one job per
//! resource in flight and bound every wait with a timeout. [`TransferManager`]
//! puts the cache in front of them.
//!
//! ```text
//! TransferManager ─┬─► CacheProvider (hits, stores, deletes, listings)
//!                  ├─► DownloadCoordinator ─► Transport::create_download_job
//!                  └─► UploadCoordinator   ─► Transport::create_publish_job
//! ```

mod download;
mod manager;
mod pending;
mod upload;

pub use download::DownloadCoordinator;
pub use manager::{DEFAULT_TIMEOUT, TransferManager};
pub use upload::UploadCoordinator;
