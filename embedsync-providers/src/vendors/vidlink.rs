//! VidLink adapter
//!
//! Dialect: JSON object payloads wrapped in an envelope,
//! `{"type": "PLAYER_EVENT", "data": {event, currentTime, duration,
//! season, episode, playing}}`. Season/episode indices are 1-based.
//! The player also posts `MEDIA_DATA` envelopes with catalog metadata;
//! those carry nothing the sync engine needs and are ignored.

use crate::provider::{episode_change_allowed, EmbedProvider, ProviderMeta, QueryParams};
use crate::types::{EmbedRequest, EpisodeRef, MediaKind, PlayerEvent, ProgressUpdate};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const META: ProviderMeta = ProviderMeta {
    id: "vidlink",
    display_name: "VidLink",
    trusted_origin: "https://vidlink.pro",
    supports_host_auto_next: true,
    near_end_threshold_secs: 1.0,
    auto_next_threshold_percent: 99.5,
};

#[derive(Debug, Default)]
pub struct VidLink;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    event: Option<String>,
    #[serde(rename = "currentTime")]
    current_time: Option<f64>,
    duration: Option<f64>,
    season: Option<i64>,
    episode: Option<i64>,
    playing: Option<bool>,
}

impl EmbedProvider for VidLink {
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
            MediaKind::Tv => {
                // VidLink resolves season 1 / episode 1 itself when the
                // route carries no episode yet.
                let ep = req.episode.unwrap_or(EpisodeRef::new(1, 1));
                url.set_path(&format!(
                    "/{segment}/{}/{}/{}",
                    req.media_id, ep.season, ep.episode
                ));
            }
        }

        let mut params = QueryParams::new();
        params.push_bool("autoplay", req.autoplay);
        if req.kind == MediaKind::Tv {
            params.push_bool("nextbutton", req.auto_next_enabled);
        }
        if let Some(theme) = &req.theme {
            params.push("primaryColor", theme.trim_start_matches('#'));
        }
        if req.resume_time_secs > 0.0 {
            params.push("startAt", format!("{:.0}", req.resume_time_secs));
        }
        params.apply(&mut url);
        Some(url)
    }

    fn handle_message(&self, payload: &Value, current: Option<EpisodeRef>) -> Vec<PlayerEvent> {
        let Ok(msg) = serde_json::from_value::<Envelope>(payload.clone()) else {
            tracing::trace!(provider = META.id, "unrecognized message shape");
            return Vec::new();
        };
        if msg.kind.as_deref() != Some("PLAYER_EVENT") {
            return Vec::new();
        }
        let data = msg.data;
        let event_name = data.event.as_deref();

        let mut events = Vec::new();
        if event_name == Some("play") || data.playing == Some(true) {
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
}
