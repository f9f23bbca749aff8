//! Throttled playback-progress persistence.
//!
//! Readers always see the latest value immediately from the in-memory
//! map; durable writes are coalesced into a dirty set a background task
//! flushes at most once per interval, last write wins. Storage failures
//! are logged and playback continues on the in-memory state.

use crate::models::PlaybackProgress;
use crate::storage::KeyValueStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const KEY_PREFIX: &str = "progress:";

pub struct ProgressStore {
    entries: DashMap<String, PlaybackProgress>,
    dirty: Mutex<HashSet<String>>,
    storage: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    /// Create the store and spawn its flush task, scoped to `cancel`.
    /// A final flush runs at cancellation so teardown loses nothing.
    #[must_use]
    pub fn spawn(
        storage: Arc<dyn KeyValueStore>,
        flush_interval: Duration,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let store = Arc::new(Self {
            entries: DashMap::new(),
            dirty: Mutex::new(HashSet::new()),
            storage,
        });

        let flusher = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        flusher.flush().await;
                        break;
                    }
                    () = tokio::time::sleep(flush_interval) => {
                        flusher.flush().await;
                    }
                }
            }
        });

        store
    }

    /// Merge a progress value; immediately visible to `get`, durably
    /// written at the next flush tick.
    pub fn update(&self, key: &str, progress: PlaybackProgress) {
        self.entries.insert(key.to_string(), progress);
        self.dirty.lock().insert(key.to_string());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<PlaybackProgress> {
        self.entries.get(key).map(|e| e.clone())
    }

    /// Read through to storage on a miss, seeding the in-memory map
    pub async fn load(&self, key: &str) -> Option<PlaybackProgress> {
        if let Some(progress) = self.get(key) {
            return Some(progress);
        }
        let raw = match self.storage.get(&storage_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "progress read failed, continuing without");
                return None;
            }
        };
        match serde_json::from_str::<PlaybackProgress>(&raw) {
            Ok(progress) => {
                self.entries.insert(key.to_string(), progress.clone());
                Some(progress)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable progress record");
                None
            }
        }
    }

    /// Drop one key, in memory and durably
    pub async fn clear(&self, key: &str) {
        self.entries.remove(key);
        self.dirty.lock().remove(key);
        if let Err(e) = self.storage.remove(&storage_key(key)).await {
            tracing::warn!(key, error = %e, "progress remove failed");
        }
    }

    /// Drop everything, in memory and durably
    pub async fn clear_all(&self) {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        self.entries.clear();
        self.dirty.lock().clear();
        for key in keys {
            if let Err(e) = self.storage.remove(&storage_key(&key)).await {
                tracing::warn!(key, error = %e, "progress remove failed");
            }
        }
    }

    /// Write all dirty entries to storage, last write wins
    pub async fn flush(&self) {
        let keys: Vec<String> = self.dirty.lock().drain().collect();
        for key in keys {
            let Some(progress) = self.get(&key) else {
                continue;
            };
            let encoded = match serde_json::to_string(&progress) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!(key, error = %e, "progress encode failed");
                    continue;
                }
            };
            if let Err(e) = self.storage.set(&storage_key(&key), encoded).await {
                tracing::warn!(key, error = %e, "progress write failed, keeping in memory");
            }
        }
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn storage_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}
