use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::location::Location;
use crate::resource::Resource;

/// How long a confirmed miss is remembered by [`MemoryNotFoundCache::new`].
pub const DEFAULT_NOT_FOUND_TTL: Duration = Duration::from_secs(300);

/// Short-term memory of resources the upstream confirmed absent.
///
/// Populated by the fetch layer on a confirmed miss and cleared by a successful
/// publish. Implementations must be safe to share between threads.
pub trait NotFoundCache: Send + Sync {
    fn add_missing(&self, resource: &Resource);

    fn is_missing(&self, resource: &Resource) -> bool;

    fn clear_missing(&self, resource: &Resource);

    fn clear_all_missing(&self);

    /// Paths currently marked missing in `location`.
    fn missing_in(&self, location: &Location) -> Vec<String>;
}

/// In-memory [`NotFoundCache`] with a fixed time-to-live per entry.
#[derive(Debug)]
pub struct MemoryNotFoundCache {
    entries: DashMap<Resource, Instant>,
    ttl:     Duration,
}

impl Default for MemoryNotFoundCache {
    fn default() -> Self { Self::new() }
}

impl MemoryNotFoundCache {
    pub fn new() -> Self { Self::with_ttl(DEFAULT_NOT_FOUND_TTL) }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| *e.value() > now).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl NotFoundCache for MemoryNotFoundCache {
    fn add_missing(&self, resource: &Resource) {
        self.entries.insert(resource.clone(), Instant::now() + self.ttl);
    }

    fn is_missing(&self, resource: &Resource) -> bool {
        let now = Instant::now();
        match self.entries.get(resource).map(|e| *e.value()) {
            Some(expiry) if expiry > now => true,
            Some(_) => {
                self.entries.remove_if(resource, |_, expiry| *expiry <= now);
                false
            }
            None => false,
        }
    }

    fn clear_missing(&self, resource: &Resource) {
        self.entries.remove(resource);
    }

    fn clear_all_missing(&self) {
        self.entries.clear();
    }

    fn missing_in(&self, location: &Location) -> Vec<String> {
        let now = Instant::now();
        self.entries.retain(|_, expiry| *expiry > now);

        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().location().as_ref() == location)
            .map(|e| e.key().path().to_string())
            .collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn resource(uri: &str, path: &str) -> Resource {
        Resource::new(Arc::new(Location::new(uri).unwrap()), path)
    }

    #[test]
    fn test_add_and_clear() {
        let nfc = MemoryNotFoundCache::new();
        let res = resource("http://foo.com", "/a/b.jar");

        assert!(!nfc.is_missing(&res));
        nfc.add_missing(&res);
        assert!(nfc.is_missing(&res));

        nfc.clear_missing(&res);
        assert!(!nfc.is_missing(&res));

        // clearing an unknown entry is a no-op
        nfc.clear_missing(&res);
    }

    #[test]
    fn test_entries_expire() {
        let nfc = MemoryNotFoundCache::with_ttl(Duration::from_millis(0));
        let res = resource("http://foo.com", "/a/b.jar");
        nfc.add_missing(&res);
        assert!(!nfc.is_missing(&res));
        assert!(nfc.is_empty());
    }

    #[test]
    fn test_missing_in_location() {
        let nfc = MemoryNotFoundCache::new();
        nfc.add_missing(&resource("http://foo.com", "/b"));
        nfc.add_missing(&resource("http://foo.com", "/a"));
        nfc.add_missing(&resource("http://bar.com", "/c"));

        let foo = Location::new("http://foo.com").unwrap();
        assert_eq!(nfc.missing_in(&foo), vec!["a".to_string(), "b".to_string()]);

        nfc.clear_all_missing();
        assert!(nfc.missing_in(&foo).is_empty());
    }
}
