//! Playback position safeguard.
//!
//! Several embed vendors intermittently report position 0 after ads,
//! quality switches, or internal reloads; persisting that report would
//! wipe a viewer's place in a two-hour film. The safeguard keeps one
//! durable {video, timestamp} slot, rejects updates that look like a
//! vendor reset rather than an intentional rewind, and offers recovery
//! when the live position appears to have been lost.

use crate::config::SafeguardConfig;
use crate::models::RecoveryOffer;
use crate::storage::KeyValueStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SLOT_KEY: &str = "safeguard:session";

/// The single persisted slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SavedSession {
    video_id: String,
    timestamp_secs: f64,
}

#[derive(Debug, Default)]
struct State {
    active_video: Option<String>,
    saved: Option<SavedSession>,
    pending: Option<RecoveryOffer>,
}

pub struct Safeguard {
    config: SafeguardConfig,
    storage: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
}

impl Safeguard {
    #[must_use]
    pub fn new(config: SafeguardConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            storage,
            state: Mutex::new(State::default()),
        }
    }

    /// Begin tracking a new video. Clears any pending recovery offer and
    /// loads the persisted slot so the overwrite-protection and recovery
    /// rules see what an earlier session saved.
    pub async fn start(&self, video_id: &str) {
        let saved = match self.storage.get(SLOT_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<SavedSession>(&raw) {
                Ok(saved) => Some(saved),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable safeguard slot");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "safeguard slot read failed, starting empty");
                None
            }
        };

        let mut state = self.state.lock();
        state.active_video = Some(video_id.to_string());
        state.pending = None;
        state.saved = saved;
    }

    /// Record a playback position, subject to the protection rules:
    /// positions below `min_progress_to_save_secs` are ignored; a jump
    /// back below `reset_protection_threshold_secs` after substantial
    /// saved progress is treated as a vendor reset and rejected; small
    /// movements below `min_delta_secs` are skipped.
    pub async fn update_progress(&self, current_time: f64) {
        if current_time < self.config.min_progress_to_save_secs {
            return;
        }

        let to_persist = {
            let mut state = self.state.lock();
            let Some(video_id) = state.active_video.clone() else {
                return;
            };
            if let Some(saved) = state.saved.as_ref().filter(|s| s.video_id == video_id) {
                let protected =
                    saved.timestamp_secs > self.config.reset_protection_threshold_secs + 10.0;
                if protected && current_time < self.config.reset_protection_threshold_secs {
                    tracing::warn!(
                        video_id,
                        saved_secs = saved.timestamp_secs,
                        reported_secs = current_time,
                        "rejecting suspected vendor reset of playback position"
                    );
                    return;
                }
                if (current_time - saved.timestamp_secs).abs() <= self.config.min_delta_secs {
                    return;
                }
            }
            let saved = SavedSession {
                video_id,
                timestamp_secs: current_time,
            };
            state.saved = Some(saved.clone());
            saved
        };

        match serde_json::to_string(&to_persist) {
            Ok(encoded) => {
                if let Err(e) = self.storage.set(SLOT_KEY, encoded).await {
                    tracing::warn!(error = %e, "safeguard slot write failed, keeping in memory");
                }
            }
            Err(e) => tracing::warn!(error = %e, "safeguard slot encode failed"),
        }
    }

    /// Compare the live position against the saved slot; when the slot
    /// is far ahead and the live position sits in the reset zone, the
    /// position was probably lost — surface a recovery offer.
    pub fn check_recovery(&self, current_time: f64) -> Option<RecoveryOffer> {
        let mut state = self.state.lock();
        let video_id = state.active_video.clone()?;
        let saved = state.saved.as_ref().filter(|s| s.video_id == video_id)?;

        let lost = saved.timestamp_secs > current_time + self.config.loss_threshold_secs
            && current_time < self.config.reset_protection_threshold_secs;
        if !lost {
            return None;
        }
        let offer = RecoveryOffer {
            video_id,
            timestamp_secs: saved.timestamp_secs,
        };
        state.pending = Some(offer.clone());
        Some(offer)
    }

    /// The offer surfaced by the last `check_recovery`, if any
    #[must_use]
    pub fn pending_recovery(&self) -> Option<RecoveryOffer> {
        self.state.lock().pending.clone()
    }

    /// Dismiss the pending offer, optionally deleting the durable slot
    pub async fn clear_recovery(&self, delete_saved: bool) {
        {
            let mut state = self.state.lock();
            state.pending = None;
            if delete_saved {
                state.saved = None;
            }
        }
        if delete_saved {
            if let Err(e) = self.storage.remove(SLOT_KEY).await {
                tracing::warn!(error = %e, "safeguard slot delete failed");
            }
        }
    }
}

impl std::fmt::Debug for Safeguard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Safeguard").finish()
    }
}
