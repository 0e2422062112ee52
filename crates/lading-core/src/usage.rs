use dashmap::DashMap;

/// String key/value store the tiered cache uses to remember what the durable
/// tier already holds.
pub trait UsageCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: String);

    fn remove(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct MemoryUsageCache {
    entries: DashMap<String, String>,
}

impl MemoryUsageCache {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl UsageCache for MemoryUsageCache {
    fn get(&self, key: &str) -> Option<String> { self.entries.get(key).map(|v| v.value().clone()) }

    fn put(&self, key: &str, value: String) { self.entries.insert(key.to_string(), value); }

    fn remove(&self, key: &str) -> Option<String> { self.entries.remove(key).map(|(_, v)| v) }
}
