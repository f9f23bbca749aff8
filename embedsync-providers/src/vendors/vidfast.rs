//! VidFast adapter
//!
//! Dialect: flat JSON object payloads, `{event, currentTime, duration,
//! season, episode}`. Season and episode indices are **0-based** and
//! shifted to the canonical 1-based scheme here. `mediaChange` is the
//! vendor's explicit in-player navigation signal; `time` is its
//! timeupdate equivalent. The player has no next-episode UI of its own,
//! so the host drives auto-next.

use crate::provider::{episode_change_allowed, EmbedProvider, ProviderMeta, QueryParams};
use crate::types::{EmbedRequest, EpisodeRef, MediaKind, PlayerEvent, ProgressUpdate};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const META: ProviderMeta = ProviderMeta {
    id: "vidfast",
    display_name: "VidFast",
    trusted_origin: "https://vidfast.pro",
    supports_host_auto_next: false,
    near_end_threshold_secs: 0.5,
    auto_next_threshold_percent: 99.5,
};

#[derive(Debug, Default)]
pub struct VidFast;

#[derive(Debug, Deserialize)]
struct Payload {
    event: Option<String>,
    #[serde(rename = "currentTime")]
    current_time: Option<f64>,
    duration: Option<f64>,
    season: Option<i64>,
    episode: Option<i64>,
}

impl EmbedProvider for VidFast {
    fn meta(&self) -> &ProviderMeta {
        &META
    }

    fn embed_url(&self, req: &EmbedRequest) -> Option<Url> {
        if req.media_id.is_empty() {
            return None;
        }
        let mut url = Url::parse(META.trusted_origin).ok()?;
        let segment = req.kind.path_segment();
        match req.kind {
            MediaKind::Movie => url.set_path(&format!("/{segment}/{}", req.media_id)),
            // VidFast cannot resolve a show without an explicit episode,
            // there is no season fallback on their side.
            MediaKind::Tv => {
                let ep = req.episode?;
                url.set_path(&format!(
                    "/{segment}/{}/{}/{}",
                    req.media_id, ep.season, ep.episode
                ));
            }
        }

        let mut params = QueryParams::new();
        params.push_bool("autoPlay", req.autoplay);
        if let Some(theme) = &req.theme {
            params.push("theme", theme.trim_start_matches('#'));
        }
        if req.resume_time_secs > 0.0 {
            params.push("startAt", format!("{:.0}", req.resume_time_secs));
        }
        params.apply(&mut url);
        Some(url)
    }

    fn handle_message(&self, payload: &Value, current: Option<EpisodeRef>) -> Vec<PlayerEvent> {
        let Ok(data) = serde_json::from_value::<Payload>(payload.clone()) else {
            tracing::trace!(provider = META.id, "unrecognized message shape");
            return Vec::new();
        };
        // Map the vendor's names onto the shared routine/non-routine split
        let event_name = data.event.as_deref().map(|name| match name {
            "time" => "timeupdate",
            other => other,
        });

        let mut events = Vec::new();
        if event_name == Some("play") {
            events.push(PlayerEvent::Started);
        }
        if let (Some(time), Some(duration)) = (data.current_time, data.duration) {
            events.push(PlayerEvent::Progress(ProgressUpdate::from_time(
                time,
                duration,
                META.near_end_threshold_secs,
            )));
        }
        if let (Some(season), Some(episode)) = (data.season, data.episode) {
            let reported = EpisodeRef::new(
                self.normalize_season(season),
                self.normalize_episode(episode),
            );
            if episode_change_allowed(reported, current, data.current_time.is_some(), event_name) {
                events.push(PlayerEvent::EpisodeChange(reported));
            }
        }
        events
    }

    fn normalize_season(&self, raw: i64) -> u32 {
        u32::try_from((raw + 1).max(1)).unwrap_or(1)
    }

    fn normalize_episode(&self, raw: i64) -> u32 {
        u32::try_from((raw + 1).max(1)).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_based_indices_are_shifted() {
        assert_eq!(VidFast.normalize_season(0), 1);
        assert_eq!(VidFast.normalize_episode(2), 3);
        // Negative garbage floors at 1
        assert_eq!(VidFast.normalize_episode(-5), 1);
    }

    #[test]
    fn media_change_signals_navigation_without_time() {
        // s0e2 in vendor indexing is s1e3 canonically
        let payload = json!({"event": "mediaChange", "season": 0, "episode": 2});
        let events = VidFast.handle_message(&payload, Some(EpisodeRef::new(1, 2)));
        assert_eq!(events, vec![PlayerEvent::EpisodeChange(EpisodeRef::new(1, 3))]);
    }

    #[test]
    fn time_echo_without_concrete_time_is_suppressed() {
        let payload = json!({"event": "time", "season": 0, "episode": 2});
        let events = VidFast.handle_message(&payload, Some(EpisodeRef::new(1, 2)));
        assert!(events.is_empty());
    }

    #[test]
    fn time_event_yields_progress_with_tight_snap() {
        let payload = json!({"event": "time", "currentTime": 119.6, "duration": 120.0});
        let events = VidFast.handle_message(&payload, None);
        match &events[0] {
            PlayerEvent::Progress(p) => assert_eq!(p.percent, 100.0),
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[test]
    fn tv_without_episode_has_no_url() {
        let mut req = EmbedRequest::tv("1396", EpisodeRef::new(1, 1));
        req.episode = None;
        assert!(VidFast.embed_url(&req).is_none());
    }

    #[test]
    fn movie_url_shape() {
        let mut req = EmbedRequest::movie("603692");
        req.resume_time_secs = 91.4;
        let url = VidFast.embed_url(&req).expect("movie url");
        assert_eq!(url.path(), "/movie/603692");
        let query = url.query().expect("query");
        assert!(query.contains("autoPlay=true"));
        assert!(query.contains("startAt=91"));
    }
}
