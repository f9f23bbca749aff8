//! Cross-origin message router — the trust boundary.
//!
//! Every raw postMessage enters here. Messages from origins outside the
//! registry's allow-list are dropped without side effects and without
//! user-visible errors; so are payloads that fail to parse. Only after
//! both checks does a payload reach a provider adapter.

use embedsync_providers::{EpisodeRef, PlayerEvent, ProviderRegistry};
use serde_json::Value;
use std::sync::Arc;

/// One raw cross-origin message as the host captured it
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender origin, scheme + host, exactly as the browser reported it
    pub origin: String,
    /// JSON object, or a JSON-encoded string (some vendors stringify)
    pub payload: Value,
}

impl InboundMessage {
    #[must_use]
    pub fn new(origin: impl Into<String>, payload: Value) -> Self {
        Self {
            origin: origin.into(),
            payload,
        }
    }
}

/// Events produced by routing one message
#[derive(Debug)]
pub struct RoutedMessage {
    pub provider_id: &'static str,
    pub events: Vec<PlayerEvent>,
}

pub struct MessageRouter {
    registry: Arc<ProviderRegistry>,
}

impl MessageRouter {
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Validate, decode, and dispatch one message.
    ///
    /// `current` is the app's route-derived episode, forwarded to the
    /// provider for echo suppression. Returns None when the message was
    /// dropped (untrusted origin or unparseable payload).
    #[must_use]
    pub fn route(&self, msg: &InboundMessage, current: Option<EpisodeRef>) -> Option<RoutedMessage> {
        let Some(provider) = self.registry.get_by_origin(&msg.origin) else {
            // Never logged above trace: an attacker probing the listener
            // must not learn anything, and busy pages post constantly.
            tracing::trace!(origin = %msg.origin, "dropping message from unregistered origin");
            return None;
        };

        let payload: Value = match &msg.payload {
            Value::String(raw) => match serde_json::from_str(raw) {
                Ok(value) => value,
                Err(_) => {
                    tracing::trace!(origin = %msg.origin, "dropping unparseable string payload");
                    return None;
                }
            },
            other => other.clone(),
        };

        let events = provider.handle_message(&payload, current);
        Some(RoutedMessage {
            provider_id: provider.meta().id,
            events,
        })
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> MessageRouter {
        MessageRouter::new(Arc::new(
            ProviderRegistry::builtin().expect("builtin registry"),
        ))
    }

    fn player_event(event: &str, time: f64, duration: f64) -> Value {
        json!({
            "type": "PLAYER_EVENT",
            "data": {"event": event, "currentTime": time, "duration": duration}
        })
    }

    #[test]
    fn trusted_origin_reaches_its_provider() {
        let msg = InboundMessage::new("https://vidlink.pro", player_event("timeupdate", 30.0, 120.0));
        let routed = router().route(&msg, None).expect("routed");
        assert_eq!(routed.provider_id, "vidlink");
        assert_eq!(routed.events.len(), 1);
    }

    #[test]
    fn unregistered_origin_is_dropped() {
        let msg = InboundMessage::new(
            "https://vidlink.pro.evil.example",
            player_event("timeupdate", 30.0, 120.0),
        );
        assert!(router().route(&msg, None).is_none());
    }

    #[test]
    fn origin_match_is_case_sensitive_and_exact() {
        let payload = player_event("timeupdate", 30.0, 120.0);
        for origin in ["https://VIDLINK.pro", "http://vidlink.pro", "vidlink.pro"] {
            let msg = InboundMessage::new(origin, payload.clone());
            assert!(router().route(&msg, None).is_none(), "origin {origin}");
        }
    }

    #[test]
    fn string_payload_is_decoded_before_dispatch() {
        let msg = InboundMessage::new(
            "https://player.videasy.net",
            Value::String(player_event("timeupdate", 30.0, 120.0).to_string()),
        );
        let routed = router().route(&msg, None).expect("routed");
        assert_eq!(routed.provider_id, "videasy");
        assert_eq!(routed.events.len(), 1);
    }

    #[test]
    fn unparseable_payload_is_dropped_silently() {
        let msg = InboundMessage::new(
            "https://vidlink.pro",
            Value::String("{\"type\": truncated".to_string()),
        );
        assert!(router().route(&msg, None).is_none());
    }

    #[test]
    fn unknown_shape_routes_to_zero_events() {
        let msg = InboundMessage::new("https://vidfast.pro", json!({"hello": "world"}));
        let routed = router().route(&msg, None).expect("routed");
        assert!(routed.events.is_empty());
    }
}
