use chrono::Utc;
use embedsync_providers::{EpisodeRef, MediaKind};
use serde::{Deserialize, Serialize};

/// Identity of the media a session is currently pointed at.
///
/// Created on navigation to a watch target and discarded on navigation
/// away; the session compares incoming player reports against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    pub media_id: String,
    pub kind: MediaKind,
    pub episode: Option<EpisodeRef>,
}

impl WatchTarget {
    #[must_use]
    pub fn movie(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            kind: MediaKind::Movie,
            episode: None,
        }
    }

    #[must_use]
    pub fn tv(media_id: impl Into<String>, episode: EpisodeRef) -> Self {
        Self {
            media_id: media_id.into(),
            kind: MediaKind::Tv,
            episode: Some(episode),
        }
    }

    /// Key progress entries are stored under: episode-qualified for TV,
    /// plain media id for movies.
    #[must_use]
    pub fn progress_key(&self) -> String {
        match self.episode {
            Some(ep) => format!("{}:{ep}", self.media_id),
            None => self.media_id.clone(),
        }
    }
}

impl std::fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.episode {
            Some(ep) => write!(f, "{} {ep}", self.media_id),
            None => write!(f, "{}", self.media_id),
        }
    }
}

/// Saved playback position for one progress key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackProgress {
    /// Always clamped to [0, 100]
    pub percent: f64,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub updated_at_millis: i64,
}

impl PlaybackProgress {
    #[must_use]
    pub fn new(percent: f64, position_secs: f64, duration_secs: f64) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            position_secs,
            duration_secs,
            updated_at_millis: Utc::now().timestamp_millis(),
        }
    }
}

/// One season of a show as the metadata catalog reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub number: u32,
    pub episode_count: u32,
}

/// Entry appended to the watch history, once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub media_id: String,
    pub kind: MediaKind,
    pub episode: Option<EpisodeRef>,
}

/// Entry upserted into the continue-watching shelf while mid-playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueWatchingEntry {
    pub media_id: String,
    pub kind: MediaKind,
    pub episode: Option<EpisodeRef>,
    pub percent: f64,
    pub position_secs: f64,
}

/// Offer to restore a playback position the safeguard believes was lost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryOffer {
    pub video_id: String,
    pub timestamp_secs: f64,
}

/// Episode-sync state machine states.
///
/// `Loading → Navigating → Synced ⇄ Diverging → Navigating` with
/// terminal `Ended` on session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Session exists, no watch target yet
    Loading,
    /// Target just changed; episode-change reports are suppressed until
    /// enough real playback has been observed
    Navigating,
    /// Player and app agree on the current episode
    Synced,
    /// Player reported a different episode; resynchronization underway
    Diverging,
    /// Session torn down
    Ended,
}
