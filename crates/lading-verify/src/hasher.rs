use digest::{Digest, FixedOutputReset};

use crate::DigestAlgorithm;

/// Incremental digest accumulator.
///
/// Object safe so a stream can hold an ordered collection of them, one per
/// configured algorithm.
pub trait Hasher: Send {
    fn algorithm(&self) -> DigestAlgorithm;

    fn update(&mut self, data: &[u8]);

    /// Digest of everything fed so far; the accumulator starts over afterwards.
    fn finalize(&mut self) -> Vec<u8>;

    fn finalize_hex(&mut self) -> String { hex::encode(self.finalize()) }
}

pub struct DigestHasher<D> {
    algorithm: DigestAlgorithm,
    inner:     D,
}

impl<D: Digest> DigestHasher<D> {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            inner: D::new(),
        }
    }
}

impl<D: Digest + FixedOutputReset + Send> Hasher for DigestHasher<D> {
    fn algorithm(&self) -> DigestAlgorithm { self.algorithm }

    fn update(&mut self, data: &[u8]) { Digest::update(&mut self.inner, data); }

    fn finalize(&mut self) -> Vec<u8> { self.inner.finalize_reset().to_vec() }
}

/// Fresh accumulator for `algorithm`.
pub fn hasher_for(algorithm: DigestAlgorithm) -> Box<dyn Hasher> {
    match algorithm {
        DigestAlgorithm::Md5 => Box::new(DigestHasher::<md5::Md5>::new(algorithm)),
        DigestAlgorithm::Sha1 => Box::new(DigestHasher::<sha1::Sha1>::new(algorithm)),
        DigestAlgorithm::Sha256 => Box::new(DigestHasher::<sha2::Sha256>::new(algorithm)),
        DigestAlgorithm::Sha384 => Box::new(DigestHasher::<sha2::Sha384>::new(algorithm)),
        DigestAlgorithm::Sha512 => Box::new(DigestHasher::<sha2::Sha512>::new(algorithm)),
    }
}

/// One-shot lowercase hex digest of `data`.
pub fn digest_hex(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    let mut hasher = hasher_for(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_value() {
        assert_eq!(
            digest_hex(DigestAlgorithm::Md5, b"this is a test"),
            "54b0c58c7ce9f2a8b551351102ee0938"
        );
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            digest_hex(DigestAlgorithm::Sha256, b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = hasher_for(DigestAlgorithm::Sha1);
        hasher.update(b"this is ");
        hasher.update(b"a test");
        assert_eq!(hasher.finalize_hex(), digest_hex(DigestAlgorithm::Sha1, b"this is a test"));
    }

    #[test]
    fn test_digest_lengths() {
        for algorithm in DigestAlgorithm::ALL {
            let mut hasher = hasher_for(algorithm);
            hasher.update(b"x");
            assert_eq!(hasher.finalize().len(), algorithm.digest_length());
        }
    }
}
