// Embed Provider Trait
//
// Core interface every vendor adapter implements, plus the shared
// helpers (query deduplication, episode-change guard) they build on.

use crate::types::{EmbedRequest, EpisodeRef, PlayerEvent};
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

/// Static description of one embed vendor
#[derive(Debug, Clone)]
pub struct ProviderMeta {
    /// Stable identifier, used in routing tables and persisted settings
    pub id: &'static str,
    pub display_name: &'static str,
    /// Exact origin (scheme + host) the vendor's iframe posts from.
    /// Must be unique across the registry.
    pub trusted_origin: &'static str,
    /// Whether the vendor's own UI can advance to the next episode, in
    /// which case the host passes the preference through in the URL.
    pub supports_host_auto_next: bool,
    /// Remaining seconds below which a progress report is treated as
    /// completed. Vendors differ in how early they stop emitting
    /// timeupdates, hence per-provider tuning.
    pub near_end_threshold_secs: f64,
    /// Completion percentage at which auto-next fires. Kept just below
    /// 100 to tolerate floating-point jitter in vendor reports.
    pub auto_next_threshold_percent: f64,
}

/// Adapter for one external embeddable video player vendor.
///
/// Implementations are pure: URL generation and message normalization
/// only, no I/O, no internal state. `handle_message` is total — any
/// payload shape it does not recognize produces no events.
pub trait EmbedProvider: Send + Sync {
    fn meta(&self) -> &ProviderMeta;

    /// Build the iframe URL for a watch session, or None when required
    /// data is missing. Callers must render a fallback state on None,
    /// never a broken iframe.
    fn embed_url(&self, req: &EmbedRequest) -> Option<Url>;

    /// Normalize one raw vendor payload into canonical events.
    ///
    /// `current` is the app's route-derived episode, used to suppress
    /// episode-change echoes (see [`episode_change_allowed`]).
    fn handle_message(&self, payload: &Value, current: Option<EpisodeRef>) -> Vec<PlayerEvent>;

    /// Convert a vendor-native season index to the 1-based scheme
    fn normalize_season(&self, raw: i64) -> u32 {
        u32::try_from(raw.max(1)).unwrap_or(1)
    }

    /// Convert a vendor-native episode index to the 1-based scheme.
    /// Overridden by 0-based vendors.
    fn normalize_episode(&self, raw: i64) -> u32 {
        u32::try_from(raw.max(1)).unwrap_or(1)
    }
}

/// Player event names that fire continuously during normal playback.
///
/// Season/episode fields piggybacking on these are metadata echoes, not
/// user navigation, unless a concrete playback time confirms the player
/// is really somewhere else.
#[must_use]
pub fn is_routine_event(name: &str) -> bool {
    matches!(name, "timeupdate" | "play" | "seek" | "seeked")
}

/// Decide whether a reported (season, episode) may be surfaced as an
/// [`PlayerEvent::EpisodeChange`].
///
/// Two conditions, both required:
/// - the reported pair differs from the app's current episode (a player
///   echoing back the episode we navigated it to must never trigger a
///   re-navigation loop);
/// - the message carried a concrete playback time, or originated from a
///   non-routine event.
#[must_use]
pub fn episode_change_allowed(
    reported: EpisodeRef,
    current: Option<EpisodeRef>,
    has_time: bool,
    event_name: Option<&str>,
) -> bool {
    let differs = match current {
        Some(cur) => cur != reported,
        None => false,
    };
    if !differs {
        return false;
    }
    has_time || event_name.is_none_or(|name| !is_routine_event(name))
}

/// Order-preserving query parameter set with case-insensitive key
/// deduplication, last value wins.
///
/// Some vendors reject URLs with repeated query keys, so every builtin
/// adapter funnels its parameters through this before serializing.
#[derive(Debug, Default)]
pub struct QueryParams {
    entries: IndexMap<String, (String, String)>,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.entries.entry(key.to_ascii_lowercase()) {
            indexmap::map::Entry::Occupied(mut entry) => {
                // Keep the first spelling and its slot, take the new value
                entry.get_mut().1 = value.into();
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert((key, value.into()));
            }
        }
    }

    pub fn push_bool(&mut self, key: impl Into<String>, value: bool) {
        self.push(key, if value { "true" } else { "false" });
    }

    /// Serialize into the URL's query string, replacing whatever was there
    pub fn apply(&self, url: &mut Url) {
        if self.entries.is_empty() {
            url.set_query(None);
            return;
        }
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in self.entries.values() {
            pairs.append_pair(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_dedup_case_insensitive_last_wins() {
        let mut params = QueryParams::new();
        params.push("autoPlay", "false");
        params.push("color", "fbc9ff");
        params.push("autoplay", "true");

        let mut url = Url::parse("https://player.example/movie/1").expect("static url");
        params.apply(&mut url);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs.len(), 2);
        // Last value won, first key spelling kept its slot
        assert_eq!(pairs[0], ("autoPlay".to_string(), "true".to_string()));
        assert_eq!(pairs[1], ("color".to_string(), "fbc9ff".to_string()));
    }

    #[test]
    fn empty_params_clear_query() {
        let params = QueryParams::new();
        let mut url = Url::parse("https://player.example/movie/1?stale=1").expect("static url");
        params.apply(&mut url);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn same_episode_never_allows_change() {
        let cur = EpisodeRef::new(1, 2);
        assert!(!episode_change_allowed(cur, Some(cur), true, None));
        assert!(!episode_change_allowed(
            cur,
            Some(cur),
            false,
            Some("mediaChange")
        ));
    }

    #[test]
    fn routine_echo_without_time_is_suppressed() {
        let reported = EpisodeRef::new(1, 3);
        let current = Some(EpisodeRef::new(1, 2));
        assert!(!episode_change_allowed(
            reported,
            current,
            false,
            Some("timeupdate")
        ));
        // A concrete time rescues routine events
        assert!(episode_change_allowed(
            reported,
            current,
            true,
            Some("timeupdate")
        ));
        // Non-routine events stand on their own
        assert!(episode_change_allowed(
            reported,
            current,
            false,
            Some("ended")
        ));
    }

    #[test]
    fn unknown_current_episode_suppresses_change() {
        let reported = EpisodeRef::new(1, 3);
        assert!(!episode_change_allowed(reported, None, true, None));
    }
}
