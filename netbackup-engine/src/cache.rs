//! Last-known-good configuration cache.

use dashmap::DashMap;

/// Maps a device address to the configuration text most recently persisted
/// for it. The cached copy is what differential backups diff against.
/// Process lifetime, no expiry.
#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: DashMap<String, String>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, device_address: &str) -> Option<String> {
        self.entries.get(device_address).map(|e| e.value().clone())
    }

    /// Overwrite the cached text after a successful write.
    pub fn store(&self, device_address: &str, config: &str) {
        self.entries
            .insert(device_address.to_string(), config.to_string());
    }

    pub fn remove(&self, device_address: &str) -> Option<String> {
        self.entries.remove(device_address).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
