use std::io::{self, Read};

use crate::{CacheResult, EntryReader, Transfer};

/// Reader that deletes its cache entry once the caller is done with it.
///
/// Used for content that must not outlive a single consumption. The entry,
/// its checksum siblings and its exchange metadata are removed on
/// [`close`](ReadOnceReader::close) or, best-effort, on drop.
pub struct ReadOnceReader {
    reader:   Option<EntryReader>,
    transfer: Option<Transfer>,
}

impl ReadOnceReader {
    pub fn new(reader: EntryReader, transfer: Transfer) -> Self {
        Self {
            reader:   Some(reader),
            transfer: Some(transfer),
        }
    }

    pub fn open(transfer: Transfer) -> CacheResult<Self> {
        let reader = transfer.open_reader()?;
        Ok(Self::new(reader, transfer))
    }

    /// Release the entry and delete it, reporting deletion failures.
    pub fn close(mut self) -> CacheResult<()> { self.cleanup() }

    fn cleanup(&mut self) -> CacheResult<()> {
        // the shared lock must be gone before delete takes the exclusive one
        self.reader.take();
        match self.transfer.take() {
            Some(transfer) => transfer.delete().map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Read for ReadOnceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.reader {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for ReadOnceReader {
    fn drop(&mut self) {
        if self.transfer.is_none() {
            return;
        }
        let target = self.transfer.as_ref().map(|t| t.to_string()).unwrap_or_default();
        if let Err(e) = self.cleanup() {
            tracing::warn!(resource = %target, error = %e, "failed to delete read-once entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileCacheProvider;
    use lading_core::{Location, Resource};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn transfer(root: &std::path::Path) -> Transfer {
        let location = Arc::new(Location::new("http://foo.com").unwrap());
        Transfer::new(
            Resource::new(location, "once/item.json"),
            Arc::new(FileCacheProvider::new(root)),
        )
    }

    #[test]
    fn test_close_deletes_entry_and_metadata() {
        let dir = tempdir().unwrap();
        let txfr = transfer(dir.path());
        txfr.write_all(b"{\"a\":1}").unwrap();
        txfr.metadata().write_all(b"{}").unwrap();

        let mut reader = ReadOnceReader::open(txfr.clone()).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "{\"a\":1}");
        reader.close().unwrap();

        assert!(!txfr.exists());
        assert!(!txfr.metadata().exists());
    }

    #[test]
    fn test_drop_deletes_entry() {
        let dir = tempdir().unwrap();
        let txfr = transfer(dir.path());
        txfr.write_all(b"x").unwrap();

        drop(ReadOnceReader::open(txfr.clone()).unwrap());
        assert!(!txfr.exists());
    }

    #[test]
    fn test_open_missing_entry() {
        let dir = tempdir().unwrap();
        assert!(ReadOnceReader::open(transfer(dir.path())).is_err());
    }
}
