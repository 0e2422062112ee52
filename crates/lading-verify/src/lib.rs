//! Content digest primitives for Lading's checksum pipeline.
//!
//! Provides incremental hashing without enforcing a verification policy.
//! Digests are computed while data moves, so content is never re-read to
//! produce a checksum.
//!
//! # Example
//!
//! ```
//! use lading_verify::{DigestAlgorithm, digest_hex, hasher_for};
//!
//! let mut hasher = hasher_for(DigestAlgorithm::Sha256);
//! hasher.update(b"hello ");
//! hasher.update(b"world");
//!
//! assert_eq!(hasher.finalize_hex(), digest_hex(DigestAlgorithm::Sha256, b"hello world"));
//! ```

pub use self::algorithm::DigestAlgorithm;
pub use self::error::VerificationError;
pub use self::hasher::{DigestHasher, Hasher, digest_hex, hasher_for};

mod algorithm;
mod error;
mod hasher;
