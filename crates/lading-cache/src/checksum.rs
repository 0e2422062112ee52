//! Digests computed while content streams into (or out of) the cache.
//!
//! A [`ChecksummingWriter`] feeds every byte accepted by the underlying entry
//! writer to an ordered set of [`ChecksumGenerator`]s. On commit the entry is
//! committed first, then each digest is written to the `<path><suffix>`
//! sibling, so content is never read twice to produce its checksums. When the
//! entry fails to commit no sibling is written.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lading_verify::{DigestAlgorithm, Hasher, hasher_for};

use crate::{CacheError, CacheResult, EntryReader, EntryWrite, EntryWriter, Transfer};

/// Receives an algorithm name and the time spent hashing with it.
pub type TimerHook = Arc<dyn Fn(&str, Duration) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ChecksumConfig {
    pub write_checksum_files: bool,
    pub timer:                Option<TimerHook>,
}

impl ChecksumConfig {
    pub fn new(write_checksum_files: bool) -> Self {
        Self {
            write_checksum_files,
            timer: None,
        }
    }

    pub fn with_timer(mut self, timer: TimerHook) -> Self {
        self.timer = Some(timer);
        self
    }
}

impl std::fmt::Debug for ChecksumConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumConfig")
            .field("write_checksum_files", &self.write_checksum_files)
            .field("timer", &self.timer.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumGeneratorFactory {
    algorithm: DigestAlgorithm,
}

impl ChecksumGeneratorFactory {
    pub fn new(algorithm: DigestAlgorithm) -> Self { Self { algorithm } }

    pub fn algorithm(&self) -> DigestAlgorithm { self.algorithm }

    pub fn create_generator(&self, transfer: &Transfer, config: &ChecksumConfig) -> ChecksumGenerator {
        ChecksumGenerator {
            hasher:  hasher_for(self.algorithm),
            sibling: transfer.sibling(self.algorithm.suffix()),
            timer:   config.timer.clone(),
            elapsed: Duration::ZERO,
            digest:  None,
        }
    }
}

/// Factories for each of `algorithms`, in order.
pub fn factories(algorithms: &[DigestAlgorithm]) -> Vec<ChecksumGeneratorFactory> {
    algorithms.iter().copied().map(ChecksumGeneratorFactory::new).collect()
}

/// One running digest over one transfer's content.
pub struct ChecksumGenerator {
    hasher:  Box<dyn Hasher>,
    sibling: Transfer,
    timer:   Option<TimerHook>,
    elapsed: Duration,
    digest:  Option<String>,
}

impl ChecksumGenerator {
    pub fn algorithm(&self) -> DigestAlgorithm { self.hasher.algorithm() }

    pub fn sibling(&self) -> &Transfer { &self.sibling }

    pub fn update(&mut self, data: &[u8]) {
        let start = Instant::now();
        self.hasher.update(data);
        self.elapsed += start.elapsed();
    }

    /// Lowercase hex digest; computed once, further updates are ignored.
    pub fn digest_hex(&mut self) -> String {
        if let Some(digest) = &self.digest {
            return digest.clone();
        }

        let start = Instant::now();
        let digest = self.hasher.finalize_hex();
        self.elapsed += start.elapsed();
        if let Some(timer) = &self.timer {
            timer(self.hasher.algorithm().name(), self.elapsed);
        }

        self.digest = Some(digest.clone());
        digest
    }

    /// Write the digest into the checksum sibling.
    pub fn persist(&mut self) -> CacheResult<String> {
        let digest = self.digest_hex();
        let algorithm = self.algorithm();
        self.sibling
            .write_all(digest.as_bytes())
            .map_err(|e| CacheError::ChecksumPersist {
                algorithm: algorithm.name(),
                path:      self.sibling.path(),
                source:    Box::new(e),
            })?;

        tracing::trace!(resource = %self.sibling, algorithm = %algorithm, "checksum written");
        Ok(digest)
    }
}

impl std::fmt::Debug for ChecksumGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumGenerator")
            .field("algorithm", &self.algorithm())
            .field("sibling", &self.sibling)
            .finish()
    }
}

/// Entry writer that hashes the bytes it writes.
pub struct ChecksummingWriter {
    inner:       EntryWriter,
    generators:  Vec<ChecksumGenerator>,
    write_files: bool,
}

impl ChecksummingWriter {
    pub fn new(inner: EntryWriter, generators: Vec<ChecksumGenerator>, config: &ChecksumConfig) -> Self {
        Self {
            inner,
            generators,
            write_files: config.write_checksum_files,
        }
    }

    /// Open `transfer` for writing with one generator per factory.
    pub fn open(
        transfer: &Transfer,
        factories: &[ChecksumGeneratorFactory],
        config: &ChecksumConfig,
    ) -> CacheResult<Self> {
        let inner = transfer.open_writer()?;
        let generators = factories
            .iter()
            .map(|f| f.create_generator(transfer, config))
            .collect();
        Ok(Self::new(inner, generators, config))
    }
}

impl Write for ChecksummingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        for generator in &mut self.generators {
            generator.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

impl EntryWrite for ChecksummingWriter {
    fn commit(self: Box<Self>) -> CacheResult<()> {
        let ChecksummingWriter {
            inner,
            mut generators,
            write_files,
        } = *self;

        if let Err(e) = inner.commit() {
            // no siblings for content that never reached the cache
            for generator in &mut generators {
                generator.digest_hex();
            }
            return Err(e);
        }

        let mut first_error = None;
        for generator in &mut generators {
            if !write_files {
                generator.digest_hex();
                continue;
            }
            if let Err(e) = generator.persist() {
                tracing::warn!(resource = %generator.sibling(), error = %e, "checksum sibling not written");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Entry reader that hashes the bytes it hands out.
pub struct ChecksummingReader {
    inner:      EntryReader,
    generators: Vec<ChecksumGenerator>,
}

impl ChecksummingReader {
    pub fn new(inner: EntryReader, generators: Vec<ChecksumGenerator>) -> Self {
        Self { inner, generators }
    }

    pub fn open(
        transfer: &Transfer,
        factories: &[ChecksumGeneratorFactory],
        config: &ChecksumConfig,
    ) -> CacheResult<Self> {
        let inner = transfer.open_reader()?;
        let generators = factories
            .iter()
            .map(|f| f.create_generator(transfer, config))
            .collect();
        Ok(Self::new(inner, generators))
    }

    /// Digests of everything read so far, releasing the entry.
    pub fn finish(self) -> Vec<(DigestAlgorithm, String)> {
        let ChecksummingReader {
            inner,
            mut generators,
        } = self;
        drop(inner);
        generators
            .iter_mut()
            .map(|g| (g.algorithm(), g.digest_hex()))
            .collect()
    }

    /// Write every digest to its sibling, releasing the entry first.
    pub fn persist(self) -> CacheResult<Vec<(DigestAlgorithm, String)>> {
        let ChecksummingReader {
            inner,
            mut generators,
        } = self;
        drop(inner);

        let mut digests = Vec::with_capacity(generators.len());
        let mut first_error = None;
        for generator in &mut generators {
            match generator.persist() {
                Ok(digest) => digests.push((generator.algorithm(), digest)),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(digests),
        }
    }
}

impl Read for ChecksummingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for generator in &mut self.generators {
            generator.update(&buf[..n]);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheProvider, FileCacheProvider};
    use lading_core::{Location, Resource};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn transfer(root: &std::path::Path, path: &str) -> Transfer {
        let location = Arc::new(Location::new("http://foo.com").unwrap());
        Transfer::new(Resource::new(location, path), Arc::new(FileCacheProvider::new(root)))
    }

    #[test]
    fn test_md5_sibling_written() {
        let dir = tempdir().unwrap();
        let txfr = transfer(dir.path(), "test.txt");
        let config = ChecksumConfig::new(true);

        let mut writer =
            ChecksummingWriter::open(&txfr, &factories(&[DigestAlgorithm::Md5]), &config).unwrap();
        writer.write_all(b"this is a test").unwrap();
        Box::new(writer).commit().unwrap();

        assert_eq!(txfr.read_to_vec().unwrap(), b"this is a test");
        assert_eq!(
            txfr.sibling(".md5").read_to_vec().unwrap(),
            b"54b0c58c7ce9f2a8b551351102ee0938"
        );
    }

    #[test]
    fn test_no_siblings_when_disabled() {
        let dir = tempdir().unwrap();
        let txfr = transfer(dir.path(), "test.txt");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let config = ChecksumConfig::new(false).with_timer(Arc::new(move |name, _| {
            recorder.lock().unwrap().push(name.to_string());
        }));

        let mut writer = ChecksummingWriter::open(
            &txfr,
            &factories(&[DigestAlgorithm::Sha1, DigestAlgorithm::Sha256]),
            &config,
        )
        .unwrap();
        writer.write_all(b"content").unwrap();
        Box::new(writer).commit().unwrap();

        assert!(txfr.exists());
        assert!(!txfr.sibling(".sha1").exists());
        assert!(!txfr.sibling(".sha256").exists());
        assert_eq!(*seen.lock().unwrap(), vec!["SHA-1".to_string(), "SHA-256".to_string()]);
    }

    /// Rejects writes to entries ending in `.sha1`.
    struct NoSha1(FileCacheProvider);

    impl CacheProvider for NoSha1 {
        fn open_reader(&self, r: &Resource) -> CacheResult<EntryReader> { self.0.open_reader(r) }

        fn open_writer(&self, r: &Resource) -> CacheResult<EntryWriter> {
            if r.path().ends_with(".sha1") {
                return Err(CacheError::io(self.0.file_path(r), io::Error::other("read-only")));
            }
            self.0.open_writer(r)
        }

        fn exists(&self, r: &Resource) -> bool { self.0.exists(r) }

        fn is_directory(&self, r: &Resource) -> bool { self.0.is_directory(r) }

        fn list(&self, r: &Resource) -> CacheResult<Vec<String>> { self.0.list(r) }

        fn delete(&self, r: &Resource) -> CacheResult<bool> { self.0.delete(r) }

        fn copy(&self, from: &Resource, to: &Resource) -> CacheResult<()> { self.0.copy(from, to) }

        fn file_path(&self, r: &Resource) -> PathBuf { self.0.file_path(r) }
    }

    #[test]
    fn test_persist_failure_still_attempts_others() {
        let dir = tempdir().unwrap();
        let location = Arc::new(Location::new("http://foo.com").unwrap());
        let txfr = Transfer::new(
            Resource::new(location, "a.bin"),
            Arc::new(NoSha1(FileCacheProvider::new(dir.path()))),
        );

        let mut writer = ChecksummingWriter::open(
            &txfr,
            &factories(&[DigestAlgorithm::Sha1, DigestAlgorithm::Md5]),
            &ChecksumConfig::new(true),
        )
        .unwrap();
        writer.write_all(b"bytes").unwrap();
        let err = Box::new(writer).commit().unwrap_err();

        assert!(matches!(err, CacheError::ChecksumPersist { algorithm: "SHA-1", .. }));
        assert_eq!(err.kind(), lading_core::ErrorKind::ChecksumPersist);
        assert!(txfr.exists());
        assert!(txfr.sibling(".md5").exists());
    }

    /// Primary entries fail to commit; siblings go to the wrapped provider.
    struct FailingCommit(FileCacheProvider);

    struct DiskFull(EntryWriter);

    impl Write for DiskFull {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }

        fn flush(&mut self) -> io::Result<()> { self.0.flush() }
    }

    impl EntryWrite for DiskFull {
        fn commit(self: Box<Self>) -> CacheResult<()> {
            Err(CacheError::io(PathBuf::from("/x"), io::Error::other("disk full")))
        }
    }

    impl CacheProvider for FailingCommit {
        fn open_reader(&self, r: &Resource) -> CacheResult<EntryReader> { self.0.open_reader(r) }

        fn open_writer(&self, r: &Resource) -> CacheResult<EntryWriter> {
            let inner = self.0.open_writer(r)?;
            if DigestAlgorithm::ALL.iter().any(|a| r.path().ends_with(a.suffix())) {
                return Ok(inner);
            }
            Ok(Box::new(DiskFull(inner)))
        }

        fn exists(&self, r: &Resource) -> bool { self.0.exists(r) }

        fn is_directory(&self, r: &Resource) -> bool { self.0.is_directory(r) }

        fn list(&self, r: &Resource) -> CacheResult<Vec<String>> { self.0.list(r) }

        fn delete(&self, r: &Resource) -> CacheResult<bool> { self.0.delete(r) }

        fn copy(&self, from: &Resource, to: &Resource) -> CacheResult<()> { self.0.copy(from, to) }

        fn file_path(&self, r: &Resource) -> PathBuf { self.0.file_path(r) }
    }

    #[test]
    fn test_failed_commit_writes_no_siblings() {
        let dir = tempdir().unwrap();
        let location = Arc::new(Location::new("http://foo.com").unwrap());
        let txfr = Transfer::new(
            Resource::new(location, "x"),
            Arc::new(FailingCommit(FileCacheProvider::new(dir.path()))),
        );

        let mut writer = ChecksummingWriter::open(
            &txfr,
            &factories(&[DigestAlgorithm::Md5, DigestAlgorithm::Sha1]),
            &ChecksumConfig::new(true),
        )
        .unwrap();
        writer.write_all(b"this is a test").unwrap();
        let err = Box::new(writer).commit().unwrap_err();

        assert!(err.to_string().contains("disk full"));
        assert!(!txfr.exists());
        assert!(!txfr.sibling(".md5").exists());
        assert!(!txfr.sibling(".sha1").exists());
    }

    #[test]
    fn test_reader_computes_digests() {
        let dir = tempdir().unwrap();
        let txfr = transfer(dir.path(), "read.txt");
        txfr.write_all(b"this is a test").unwrap();

        let config = ChecksumConfig::new(true);
        let mut reader =
            ChecksummingReader::open(&txfr, &factories(&[DigestAlgorithm::Md5]), &config).unwrap();
        io::copy(&mut reader, &mut io::sink()).unwrap();
        let digests = reader.persist().unwrap();

        assert_eq!(digests[0].1, "54b0c58c7ce9f2a8b551351102ee0938");
        assert_eq!(
            txfr.sibling(".md5").read_to_vec().unwrap(),
            b"54b0c58c7ce9f2a8b551351102ee0938"
        );
    }
}
