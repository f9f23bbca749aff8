//! Playback session orchestration.
//!
//! Owns the episode-sync state machine: consumes canonical player
//! events from the router, persists progress, drives the safeguard,
//! decides when the player and the app have diverged, and advances to
//! the next episode exactly once when playback completes.
//!
//! Exactly one logical session is active at a time and each session
//! processes one inbound message to completion before the next, so
//! session state itself needs no synchronization. The one genuine
//! hazard — two external signals racing toward the same episode-advance
//! transition — is resolved by [`AutoNextLock`].

use crate::collab::{ContinueWatching, HistorySink, MetadataLookup, Navigator};
use crate::config::SyncConfig;
use crate::lock::{AutoNextGuard, AutoNextLock};
use crate::models::{
    ContinueWatchingEntry, HistoryEntry, PlaybackProgress, RecoveryOffer, SeasonSummary, SyncState,
    WatchTarget,
};
use crate::progress::ProgressStore;
use crate::router::{InboundMessage, MessageRouter};
use crate::safeguard::Safeguard;
use crate::{Error, Result};
use embedsync_providers::{
    EmbedProvider, EmbedRequest, EpisodeRef, MediaKind, PlayerEvent, ProgressUpdate,
    ProviderRegistry,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// External collaborators the session emits side effects through
#[derive(Clone)]
pub struct Collaborators {
    pub navigator: Arc<dyn Navigator>,
    pub history: Arc<dyn HistorySink>,
    pub continue_watching: Arc<dyn ContinueWatching>,
    pub metadata: Arc<dyn MetadataLookup>,
}

/// Per-session user preferences
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub provider_id: String,
    pub auto_next_enabled: bool,
    pub autoplay: bool,
    pub theme: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            provider_id: "vidlink".to_string(),
            auto_next_enabled: true,
            autoplay: true,
            theme: None,
        }
    }
}

/// Per-target tracking, reset on every watch target change
#[derive(Debug, Default)]
struct Tracking {
    last_player_episode: Option<EpisodeRef>,
    auto_next_fired: bool,
    playback_started: bool,
    history_added: bool,
    /// Highest playback position observed since the target changed;
    /// drives the navigation-suppression window.
    max_observed_secs: f64,
    last_position_secs: f64,
}

impl Tracking {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
struct PlaylistBinding {
    items: Vec<WatchTarget>,
    position: usize,
}

pub struct PlaybackSession {
    config: SyncConfig,
    options: SessionOptions,
    router: MessageRouter,
    provider: Arc<dyn EmbedProvider>,
    collab: Collaborators,
    progress: Arc<ProgressStore>,
    safeguard: Arc<Safeguard>,
    lock: Arc<AutoNextLock>,
    target: Option<WatchTarget>,
    playlist: Option<PlaylistBinding>,
    state: SyncState,
    tracking: Tracking,
    /// Held from auto-next firing until the host applies the navigation
    /// (`set_target`). A racing episode-change signal finds the lock
    /// busy; the watchdog clears it if the navigation never lands.
    advance_guard: Option<AutoNextGuard>,
    /// Rotated on every target change so stale metadata fetches cannot
    /// overwrite fresher state.
    fetch_cancel: CancellationToken,
    cancel: CancellationToken,
}

impl PlaybackSession {
    pub fn new(
        config: SyncConfig,
        registry: Arc<ProviderRegistry>,
        options: SessionOptions,
        collab: Collaborators,
        progress: Arc<ProgressStore>,
        safeguard: Arc<Safeguard>,
        lock: Arc<AutoNextLock>,
    ) -> Result<Self> {
        let provider = registry
            .get_by_id(&options.provider_id)
            .ok_or_else(|| Error::UnknownProvider(options.provider_id.clone()))?;
        let cancel = CancellationToken::new();
        Ok(Self {
            config,
            options,
            router: MessageRouter::new(registry),
            provider,
            collab,
            progress,
            safeguard,
            lock,
            target: None,
            playlist: None,
            state: SyncState::Loading,
            tracking: Tracking::default(),
            advance_guard: None,
            fetch_cancel: cancel.child_token(),
            cancel,
        })
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn target(&self) -> Option<&WatchTarget> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn last_player_episode(&self) -> Option<EpisodeRef> {
        self.tracking.last_player_episode
    }

    /// Build the iframe URL for the current target, resuming from saved
    /// progress when there is any. None means the caller renders a
    /// fallback state instead of an iframe.
    pub async fn embed_url(&self) -> Option<Url> {
        let target = self.target.as_ref()?;
        let resume = self
            .progress
            .load(&target.progress_key())
            .await
            .map_or(0.0, |p| p.position_secs);
        self.provider.embed_url(&EmbedRequest {
            media_id: target.media_id.clone(),
            kind: target.kind,
            episode: target.episode,
            autoplay: self.options.autoplay,
            auto_next_enabled: self.options.auto_next_enabled
                && self.provider.meta().supports_host_auto_next,
            resume_time_secs: resume,
            theme: self.options.theme.clone(),
        })
    }

    /// Point the session at a new watch target (route change).
    ///
    /// Resets all per-target tracking, completes any in-flight episode
    /// advance (releasing its lock), cancels pending metadata fetches,
    /// and enters `Navigating` — episode-change reports are suppressed
    /// until enough real playback of the new target has been observed.
    pub async fn set_target(&mut self, target: WatchTarget) {
        if self.state == SyncState::Ended {
            return;
        }
        // The navigation this advance was waiting on has landed
        self.advance_guard = None;
        self.fetch_cancel.cancel();
        self.fetch_cancel = self.cancel.child_token();
        self.tracking.reset();
        self.state = SyncState::Navigating;
        tracing::debug!(target = %target, "watch target changed, entering navigation window");
        self.safeguard.start(&target.progress_key()).await;
        self.target = Some(target);
    }

    /// Bind the session to an explicit playlist; auto-next prefers the
    /// next playlist item over episode arithmetic.
    pub fn bind_playlist(&mut self, items: Vec<WatchTarget>, position: usize) {
        self.playlist = Some(PlaylistBinding { items, position });
    }

    /// Route one raw cross-origin message and apply its events
    pub async fn handle_message(&mut self, msg: &InboundMessage) {
        if self.state == SyncState::Ended {
            return;
        }
        let current = self.target.as_ref().and_then(|t| t.episode);
        let Some(routed) = self.router.route(msg, current) else {
            return;
        };
        if routed.provider_id != self.provider.meta().id {
            // Stale iframe from a previous provider selection
            tracing::debug!(
                provider = routed.provider_id,
                active = self.provider.meta().id,
                "dropping events from inactive provider"
            );
            return;
        }
        for event in routed.events {
            self.apply_event(event).await;
        }
    }

    /// Apply one canonical player event
    pub async fn apply_event(&mut self, event: PlayerEvent) {
        if self.state == SyncState::Ended {
            return;
        }
        match event {
            PlayerEvent::Started => {
                self.tracking.playback_started = true;
            }
            PlayerEvent::Progress(update) => self.on_progress(update).await,
            PlayerEvent::EpisodeChange(episode) => self.on_episode_change(episode).await,
        }
    }

    /// Surface a recovery offer if the safeguard believes the current
    /// position was lost to a vendor reset
    #[must_use]
    pub fn check_recovery(&self) -> Option<RecoveryOffer> {
        self.safeguard.check_recovery(self.tracking.last_position_secs)
    }

    /// Tear down: terminal state, release any held lock, cancel pending
    /// work, flush progress.
    pub async fn end(&mut self) {
        if self.state == SyncState::Ended {
            return;
        }
        self.state = SyncState::Ended;
        self.advance_guard = None;
        self.fetch_cancel.cancel();
        self.progress.flush().await;
        tracing::debug!("playback session ended");
    }

    async fn on_progress(&mut self, update: ProgressUpdate) {
        let Some(target) = self.target.clone() else {
            return;
        };

        if update.current_time > 0.0 {
            self.tracking.playback_started = true;
        }
        if update.current_time > self.tracking.max_observed_secs {
            self.tracking.max_observed_secs = update.current_time;
        }
        self.tracking.last_position_secs = update.current_time;

        if self.state == SyncState::Navigating
            && self.tracking.max_observed_secs >= self.config.nav_suppression_secs
        {
            self.state = SyncState::Synced;
            tracing::debug!(target = %target, "navigation window over, session synced");
        }

        self.progress.update(
            &target.progress_key(),
            PlaybackProgress::new(update.percent, update.current_time, update.duration),
        );
        self.safeguard.update_progress(update.current_time).await;

        if !self.tracking.history_added
            && (update.current_time > self.config.history_min_secs
                || update.percent > self.config.history_min_percent)
        {
            self.tracking.history_added = true;
            if let Err(e) = self
                .collab
                .history
                .add(HistoryEntry {
                    media_id: target.media_id.clone(),
                    kind: target.kind,
                    episode: target.episode,
                })
                .await
            {
                tracing::warn!(error = %e, "history append failed");
            }
        }

        if update.percent >= self.config.continue_watching_max_percent {
            if let Err(e) = self.collab.continue_watching.remove(&target.media_id).await {
                tracing::warn!(error = %e, "continue-watching removal failed");
            }
        } else if update.percent >= self.config.continue_watching_min_percent {
            if let Err(e) = self
                .collab
                .continue_watching
                .upsert(ContinueWatchingEntry {
                    media_id: target.media_id.clone(),
                    kind: target.kind,
                    episode: target.episode,
                    percent: update.percent,
                    position_secs: update.current_time,
                })
                .await
            {
                tracing::warn!(error = %e, "continue-watching upsert failed");
            }
        }

        self.maybe_auto_next(&target, update).await;
    }

    async fn on_episode_change(&mut self, episode: EpisodeRef) {
        self.tracking.last_player_episode = Some(episode);
        let Some(target) = self.target.clone() else {
            return;
        };
        if target.kind != MediaKind::Tv {
            return;
        }
        match self.state {
            SyncState::Loading | SyncState::Navigating => {
                tracing::debug!(
                    reported = %episode,
                    "episode change suppressed inside navigation window"
                );
            }
            SyncState::Synced => {
                if target.episode != Some(episode) {
                    self.diverge(target, episode).await;
                }
            }
            SyncState::Diverging => {
                if self.advance_guard.is_none() && target.episode != Some(episode) {
                    // A previous resync attempt failed; this report is
                    // the retry trigger.
                    self.diverge(target, episode).await;
                } else {
                    tracing::debug!(reported = %episode, "divergence already in progress, recorded");
                }
            }
            SyncState::Ended => {}
        }
    }

    /// The player is somewhere else than the app thinks. Resynchronize
    /// the app's route to the player, guarded by the auto-next lock so a
    /// concurrent advance cannot produce a second navigation.
    async fn diverge(&mut self, target: WatchTarget, episode: EpisodeRef) {
        self.state = SyncState::Diverging;
        let Some(guard) = self.lock.try_acquire() else {
            tracing::debug!(
                reported = %episode,
                "player diverged while an advance holds the lock, bookkeeping only"
            );
            return;
        };
        tracing::info!(target = %target, reported = %episode, "player diverged, resyncing route");

        let Some(seasons) = self.fetch_seasons(&target.media_id).await else {
            // Fetch failed or was cancelled: stay Diverging so a later
            // report retries. The guard drops here, the lock must never
            // remain held across a failed fetch.
            return;
        };
        if !episode_exists(&seasons, episode) {
            tracing::warn!(
                reported = %episode,
                "player reported an episode the catalog does not know, staying diverged"
            );
            return;
        }

        let new_target = WatchTarget::tv(target.media_id, episode);
        if let Err(e) = self.collab.navigator.navigate(new_target.clone()).await {
            tracing::warn!(error = %e, "resync navigation failed, staying diverged");
            return;
        }
        drop(guard);

        // The session now follows the player: adopt the episode without
        // reloading the iframe and start fresh per-target tracking.
        self.tracking.reset();
        self.state = SyncState::Synced;
        self.safeguard.start(&new_target.progress_key()).await;
        self.target = Some(new_target);
    }

    async fn maybe_auto_next(&mut self, target: &WatchTarget, update: ProgressUpdate) {
        if target.kind != MediaKind::Tv || !self.options.auto_next_enabled {
            return;
        }
        if self.tracking.auto_next_fired || !self.tracking.playback_started {
            return;
        }
        // Guards against bogus zero or near-zero durations at load
        if update.current_time <= self.config.auto_next_min_secs {
            return;
        }
        let threshold = self
            .config
            .auto_next_threshold_override
            .unwrap_or(self.provider.meta().auto_next_threshold_percent);
        if update.percent < threshold {
            return;
        }
        let Some(guard) = self.lock.try_acquire() else {
            tracing::debug!("completion reached but the lock is held, advance already in flight");
            return;
        };
        self.tracking.auto_next_fired = true;

        // An explicit playlist wins over episode arithmetic
        if let Some(next) = self.playlist_peek() {
            match self.collab.navigator.navigate(next.clone()).await {
                Ok(()) => {
                    tracing::info!(next = %next, "auto-next advancing to playlist item");
                    if let Some(playlist) = self.playlist.as_mut() {
                        playlist.position += 1;
                    }
                    self.advance_guard = Some(guard);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "playlist advance failed, will retry");
                    self.tracking.auto_next_fired = false;
                }
            }
            return;
        }

        let Some(seasons) = self.fetch_seasons(&target.media_id).await else {
            // Retry on a later progress report; the guard drops here
            self.tracking.auto_next_fired = false;
            return;
        };
        let current = target.episode.unwrap_or(EpisodeRef::new(1, 1));
        let Some(next_episode) = next_episode(&seasons, current) else {
            tracing::info!(target = %target, "last episode finished, nothing to advance to");
            return;
        };

        let next = WatchTarget::tv(target.media_id.clone(), next_episode);
        match self.collab.navigator.navigate(next.clone()).await {
            Ok(()) => {
                tracing::info!(next = %next, "auto-next advancing to next episode");
                // Hold the lock until the host applies the navigation;
                // the watchdog reclaims it if that never happens.
                self.advance_guard = Some(guard);
            }
            Err(e) => {
                tracing::warn!(error = %e, "auto-next navigation failed, will retry");
                self.tracking.auto_next_fired = false;
            }
        }
    }

    fn playlist_peek(&self) -> Option<WatchTarget> {
        let playlist = self.playlist.as_ref()?;
        playlist.items.get(playlist.position + 1).cloned()
    }

    /// Season metadata lookup scoped to the session: a target change or
    /// teardown cancels it. None on cancellation or lookup failure.
    async fn fetch_seasons(&self, show_id: &str) -> Option<Vec<SeasonSummary>> {
        let cancel = self.fetch_cancel.clone();
        let metadata = Arc::clone(&self.collab.metadata);
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(show_id, "season lookup cancelled by target change");
                None
            }
            result = metadata.seasons(show_id) => match result {
                Ok(seasons) => Some(seasons),
                Err(e) => {
                    tracing::warn!(show_id, error = %e, "season lookup failed");
                    None
                }
            }
        }
    }

    /// Move the session onto its own consumer task. Commands and
    /// messages are processed strictly in order; dropping the handle's
    /// token or calling [`SessionHandle::shutdown`] tears the session
    /// down.
    #[must_use]
    pub fn spawn(mut self, capacity: usize) -> SessionHandle {
        let cancel = self.cancel.clone();
        let loop_cancel = self.cancel.clone();
        let (sender, mut receiver) = mpsc::channel(capacity);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = loop_cancel.cancelled() => break,
                    command = receiver.recv() => match command {
                        Some(SessionCommand::Message(msg)) => self.handle_message(&msg).await,
                        Some(SessionCommand::SetTarget(target)) => self.set_target(target).await,
                        Some(SessionCommand::BindPlaylist { items, position }) => {
                            self.bind_playlist(items, position);
                        }
                        None => break,
                    }
                }
            }
            self.end().await;
        });
        SessionHandle {
            sender,
            cancel,
            task,
        }
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("provider", &self.provider.meta().id)
            .field("state", &self.state)
            .field("target", &self.target)
            .finish()
    }
}

#[derive(Debug)]
enum SessionCommand {
    Message(InboundMessage),
    SetTarget(WatchTarget),
    BindPlaylist {
        items: Vec<WatchTarget>,
        position: usize,
    },
}

/// Handle to a spawned session's consumer task
#[derive(Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue one raw cross-origin message
    pub async fn deliver(&self, msg: InboundMessage) -> Result<()> {
        self.sender
            .send(SessionCommand::Message(msg))
            .await
            .map_err(|_| Error::Internal("session task stopped".to_string()))
    }

    /// Point the session at a new watch target
    pub async fn set_target(&self, target: WatchTarget) -> Result<()> {
        self.sender
            .send(SessionCommand::SetTarget(target))
            .await
            .map_err(|_| Error::Internal("session task stopped".to_string()))
    }

    pub async fn bind_playlist(&self, items: Vec<WatchTarget>, position: usize) -> Result<()> {
        self.sender
            .send(SessionCommand::BindPlaylist { items, position })
            .await
            .map_err(|_| Error::Internal("session task stopped".to_string()))
    }

    /// Drain queued commands, tear the session down, and wait for it
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.task.await;
    }

    /// Abort without draining the queue
    pub fn abort(&self) {
        self.cancel.cancel();
    }
}

/// Resolve the episode auto-next should advance to, or None at the end
/// of the series.
fn next_episode(seasons: &[SeasonSummary], current: EpisodeRef) -> Option<EpisodeRef> {
    if let Some(season) = seasons.iter().find(|s| s.number == current.season) {
        if current.episode < season.episode_count {
            return Some(EpisodeRef::new(current.season, current.episode + 1));
        }
    }
    seasons
        .iter()
        .filter(|s| s.number > current.season && s.number > 0 && s.episode_count > 0)
        .min_by_key(|s| s.number)
        .map(|s| EpisodeRef::new(s.number, 1))
}

fn episode_exists(seasons: &[SeasonSummary], episode: EpisodeRef) -> bool {
    seasons
        .iter()
        .any(|s| s.number == episode.season && episode.episode <= s.episode_count)
}
