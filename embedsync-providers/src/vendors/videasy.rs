//! Videasy adapter
//!
//! Dialect: the same nested envelope as VidLink, but posted as a
//! JSON-encoded *string* rather than an object, so payloads are decoded
//! twice. Season/episode indices are 1-based.

use crate::provider::{episode_change_allowed, EmbedProvider, ProviderMeta, QueryParams};
use crate::types::{EmbedRequest, EpisodeRef, MediaKind, PlayerEvent, ProgressUpdate};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const META: ProviderMeta = ProviderMeta {
    id: "videasy",
    display_name: "Videasy",
    trusted_origin: "https://player.videasy.net",
    supports_host_auto_next: true,
    // Videasy stops reporting timeupdates well before the credits
    near_end_threshold_secs: 2.0,
    auto_next_threshold_percent: 99.5,
};

#[derive(Debug, Default)]
pub struct Videasy;

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
}

impl EmbedProvider for Videasy {
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
            params.push_bool("autoplayNextEpisode", req.auto_next_enabled);
            params.push_bool("episodeSelector", true);
        }
        if let Some(theme) = &req.theme {
            params.push("color", theme.trim_start_matches('#'));
        }
        if req.resume_time_secs > 0.0 {
            params.push("progress", format!("{:.0}", req.resume_time_secs));
        }
        params.apply(&mut url);
        Some(url)
    }

    fn handle_message(&self, payload: &Value, current: Option<EpisodeRef>) -> Vec<PlayerEvent> {
        // Unwrap the string transport layer first
        let inner: Value = match payload {
            Value::String(raw) => match serde_json::from_str(raw) {
                Ok(value) => value,
                Err(_) => return Vec::new(),
            },
            other => other.clone(),
        };
        let Ok(msg) = serde_json::from_value::<Envelope>(inner) else {
            tracing::trace!(provider = META.id, "unrecognized message shape");
            return Vec::new();
        };
        if msg.kind.as_deref() != Some("PLAYER_EVENT") {
            return Vec::new();
        }
        let data = msg.data;
        let event_name = data.event.as_deref();

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_payload_is_decoded() {
        let payload = Value::String(
            r#"{"type":"PLAYER_EVENT","data":{"event":"timeupdate","currentTime":60.0,"duration":240.0}}"#
                .to_string(),
        );
        let events = Videasy.handle_message(&payload, None);
        assert_eq!(
            events,
            vec![PlayerEvent::Progress(ProgressUpdate {
                current_time: 60.0,
                duration: 240.0,
                percent: 25.0,
            })]
        );
    }

    #[test]
    fn object_payload_also_accepted() {
        let payload = json!({
            "type": "PLAYER_EVENT",
            "data": {"event": "play"}
        });
        let events = Videasy.handle_message(&payload, None);
        assert_eq!(events, vec![PlayerEvent::Started]);
    }

    #[test]
    fn malformed_string_yields_nothing() {
        let payload = Value::String("{not json".to_string());
        assert!(Videasy.handle_message(&payload, None).is_empty());
    }

    #[test]
    fn near_end_uses_two_second_threshold() {
        let payload = json!({
            "type": "PLAYER_EVENT",
            "data": {"event": "timeupdate", "currentTime": 118.5, "duration": 120.0}
        });
        let events = Videasy.handle_message(&payload, None);
        match &events[0] {
            PlayerEvent::Progress(p) => assert_eq!(p.percent, 100.0),
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[test]
    fn tv_url_carries_videasy_params() {
        let req = EmbedRequest::tv("66732", EpisodeRef::new(4, 8));
        let url = Videasy.embed_url(&req).expect("tv url");
        assert_eq!(url.path(), "/tv/66732/4/8");
        let query = url.query().expect("query");
        assert!(query.contains("autoplayNextEpisode=true"));
        assert!(query.contains("episodeSelector=true"));
    }
}
