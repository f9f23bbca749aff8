// External collaborators.
//
// The session emits its side effects through these traits so catalog
// browsing, history, and routing stay outside the sync engine. The
// implementations live in the host application, the seam mirrors the
// injection points the engine is tested through.

use crate::models::{ContinueWatchingEntry, HistoryEntry, SeasonSummary, WatchTarget};
use crate::Result;
use async_trait::async_trait;

/// Route updates. Implementations must update the session target in
/// place — the already-loaded iframe is playing the right thing, a
/// reload would interrupt it.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, target: WatchTarget) -> Result<()>;
}

/// Watch-history sink; the session appends at most once per target
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn add(&self, entry: HistoryEntry) -> Result<()>;
}

/// Continue-watching shelf
#[async_trait]
pub trait ContinueWatching: Send + Sync {
    async fn upsert(&self, entry: ContinueWatchingEntry) -> Result<()>;
    async fn remove(&self, media_id: &str) -> Result<()>;
}

/// Season/episode catalog lookups, consumed when resolving the next
/// episode. Asynchronous; the session cancels in-flight lookups when
/// its watch target changes.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn seasons(&self, show_id: &str) -> Result<Vec<SeasonSummary>>;
}
