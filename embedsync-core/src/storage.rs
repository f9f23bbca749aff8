// Durable key-value storage boundary.
//
// The engine persists progress and safeguard records through this trait;
// the host supplies the real backend (browser storage, disk, a service).
// Storage failures are surfaced as errors but treated as non-fatal by
// every caller: playback continues on in-memory state.

use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store, used in tests and when the host provides no durable
/// backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store that fails every operation, for exercising degraded paths
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingStore;

#[cfg(test)]
#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Storage("backend unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(Error::Storage("quota exceeded".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::Storage("backend unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store
            .set("progress:1396:s1e2", "{}".to_string())
            .await
            .expect("set");
        assert_eq!(
            store.get("progress:1396:s1e2").await.expect("get"),
            Some("{}".to_string())
        );
        store.remove("progress:1396:s1e2").await.expect("remove");
        assert!(store.get("progress:1396:s1e2").await.expect("get").is_none());
        assert!(store.is_empty());
    }
}
