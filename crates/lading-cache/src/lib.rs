//! Cache layer for Lading.
//!
//! # Architecture
//!
//! ```text
//! Transfer ──► CacheProvider ─┬─► FileCacheProvider   (per-path fs2 locks, staged commits)
//!    │                        └─► TieredCacheProvider (fast tier + durable tier, background push)
//!    │
//!    ├─► ChecksummingWriter / ChecksummingReader (digests while streaming)
//!    └─► ReadOnceReader (deletes the entry after use)
//! ```
//!
//! Cache I/O is synchronous; async callers move it onto the worker pool.

mod checksum;
mod error;
mod file;
mod mapping;
mod provider;
mod read_once;
mod tiered;
mod transfer;

pub mod tck;

pub use checksum::{
    ChecksumConfig, ChecksumGenerator, ChecksumGeneratorFactory, ChecksummingReader, ChecksummingWriter,
    TimerHook, factories,
};
pub use error::{CacheError, CacheResult};
pub use file::{EntryStat, FileCacheProvider};
pub use mapping::{LOCK_DIR, PathMapping};
pub use provider::{CacheProvider, EntryReader, EntryWrite, EntryWriter};
pub use read_once::ReadOnceReader;
pub use tiered::{SyncMarker, TieredCacheProvider};
pub use transfer::{HTTP_METADATA_SUFFIX, Transfer, sibling_suffixes};
