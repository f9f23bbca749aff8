//! Test helpers and fixtures for embedsync-core tests
//!
//! Recording fakes for each collaborator plus a fixture builder that
//! wires a session against in-memory storage.

use crate::collab::{ContinueWatching, HistorySink, MetadataLookup, Navigator};
use crate::config::{SafeguardConfig, SyncConfig};
use crate::lock::AutoNextLock;
use crate::models::{ContinueWatchingEntry, HistoryEntry, SeasonSummary, WatchTarget};
use crate::progress::ProgressStore;
use crate::safeguard::Safeguard;
use crate::session::{Collaborators, PlaybackSession, SessionOptions};
use crate::storage::MemoryStore;
use crate::{Error, Result};
use async_trait::async_trait;
use embedsync_providers::{PlayerEvent, ProgressUpdate, ProviderRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Progress event as a provider with a 1-second near-end threshold
/// would emit it
pub fn progress_event(current_time: f64, duration: f64) -> PlayerEvent {
    PlayerEvent::Progress(ProgressUpdate::from_time(current_time, duration, 1.0))
}

#[derive(Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<WatchTarget>>,
}

impl RecordingNavigator {
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.targets.lock().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, target: WatchTarget) -> Result<()> {
        self.targets.lock().push(target);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl RecordingHistory {
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl HistorySink for RecordingHistory {
    async fn add(&self, entry: HistoryEntry) -> Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingShelf {
    upserts: Mutex<Vec<ContinueWatchingEntry>>,
    removals: Mutex<Vec<String>>,
}

impl RecordingShelf {
    pub fn upserts(&self) -> Vec<ContinueWatchingEntry> {
        self.upserts.lock().clone()
    }

    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().clone()
    }
}

#[async_trait]
impl ContinueWatching for RecordingShelf {
    async fn upsert(&self, entry: ContinueWatchingEntry) -> Result<()> {
        self.upserts.lock().push(entry);
        Ok(())
    }

    async fn remove(&self, media_id: &str) -> Result<()> {
        self.removals.lock().push(media_id.to_string());
        Ok(())
    }
}

/// Catalog that answers every show with the same season list
pub struct StaticMetadata {
    pub seasons: Vec<SeasonSummary>,
}

impl Default for StaticMetadata {
    fn default() -> Self {
        Self {
            seasons: vec![
                SeasonSummary {
                    number: 1,
                    episode_count: 3,
                },
                SeasonSummary {
                    number: 2,
                    episode_count: 10,
                },
            ],
        }
    }
}

#[async_trait]
impl MetadataLookup for StaticMetadata {
    async fn seasons(&self, _show_id: &str) -> Result<Vec<SeasonSummary>> {
        Ok(self.seasons.clone())
    }
}

pub struct FailingMetadata;

#[async_trait]
impl MetadataLookup for FailingMetadata {
    async fn seasons(&self, show_id: &str) -> Result<Vec<SeasonSummary>> {
        Err(Error::Metadata(format!("lookup unavailable for {show_id}")))
    }
}

/// Catalog that fails a fixed number of lookups before recovering,
/// for exercising retry paths across a transient outage
pub struct FlakyMetadata {
    failures_left: Mutex<u32>,
    inner: StaticMetadata,
}

impl FlakyMetadata {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: Mutex::new(times),
            inner: StaticMetadata::default(),
        }
    }
}

#[async_trait]
impl MetadataLookup for FlakyMetadata {
    async fn seasons(&self, show_id: &str) -> Result<Vec<SeasonSummary>> {
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(Error::Metadata(format!("lookup timed out for {show_id}")));
            }
        }
        self.inner.seasons(show_id).await
    }
}

/// Everything a session test needs, wired against in-memory storage
pub struct SessionFixture {
    pub registry: Arc<ProviderRegistry>,
    pub navigator: Arc<RecordingNavigator>,
    pub history: Arc<RecordingHistory>,
    pub shelf: Arc<RecordingShelf>,
    pub metadata: Arc<dyn MetadataLookup>,
    pub progress: Arc<ProgressStore>,
    pub safeguard: Arc<Safeguard>,
    pub lock: Arc<AutoNextLock>,
    pub cancel: CancellationToken,
}

impl SessionFixture {
    /// Must be called from within a tokio runtime (the progress store
    /// spawns its flush task)
    pub fn new() -> Self {
        let storage = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let progress = ProgressStore::spawn(
            Arc::clone(&storage) as _,
            Duration::from_secs(1),
            cancel.child_token(),
        );
        let safeguard = Arc::new(Safeguard::new(
            SafeguardConfig::default(),
            Arc::clone(&storage) as _,
        ));
        Self {
            registry: Arc::new(ProviderRegistry::builtin().expect("builtin registry")),
            navigator: Arc::new(RecordingNavigator::default()),
            history: Arc::new(RecordingHistory::default()),
            shelf: Arc::new(RecordingShelf::default()),
            metadata: Arc::new(StaticMetadata::default()),
            progress,
            safeguard,
            lock: Arc::new(AutoNextLock::new(Duration::from_secs(10))),
            cancel,
        }
    }

    #[must_use]
    pub fn with_failing_metadata(mut self) -> Self {
        self.metadata = Arc::new(FailingMetadata);
        self
    }

    #[must_use]
    pub fn with_flaky_metadata(mut self, failures: u32) -> Self {
        self.metadata = Arc::new(FlakyMetadata::failing(failures));
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            navigator: Arc::clone(&self.navigator) as _,
            history: Arc::clone(&self.history) as _,
            continue_watching: Arc::clone(&self.shelf) as _,
            metadata: Arc::clone(&self.metadata),
        }
    }

    pub fn build(&self) -> Result<PlaybackSession> {
        self.build_with_options(SessionOptions::default())
    }

    pub fn build_with_options(&self, options: SessionOptions) -> Result<PlaybackSession> {
        PlaybackSession::new(
            SyncConfig::default(),
            Arc::clone(&self.registry),
            options,
            self.collaborators(),
            Arc::clone(&self.progress),
            Arc::clone(&self.safeguard),
            Arc::clone(&self.lock),
        )
    }
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self::new()
    }
}
