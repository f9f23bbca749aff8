use serde::{Deserialize, Serialize};

/// Kind of media a watch session points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    /// Path segment used by every builtin vendor
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

/// Canonical (season, episode) pair, always 1-based.
///
/// Vendor-native 0-based indices are shifted at the provider boundary;
/// nothing past that boundary ever sees a 0 season or episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeRef {
    #[must_use]
    pub const fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl std::fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}e{}", self.season, self.episode)
    }
}

/// Immutable per-navigation session configuration, input to URL generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub media_id: String,
    pub kind: MediaKind,
    pub episode: Option<EpisodeRef>,
    pub autoplay: bool,
    pub auto_next_enabled: bool,
    /// Position to resume from, in seconds. 0 means play from the start.
    pub resume_time_secs: f64,
    pub theme: Option<String>,
}

impl EmbedRequest {
    #[must_use]
    pub fn movie(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            kind: MediaKind::Movie,
            episode: None,
            autoplay: true,
            auto_next_enabled: false,
            resume_time_secs: 0.0,
            theme: None,
        }
    }

    #[must_use]
    pub fn tv(media_id: impl Into<String>, episode: EpisodeRef) -> Self {
        Self {
            media_id: media_id.into(),
            kind: MediaKind::Tv,
            episode: Some(episode),
            autoplay: true,
            auto_next_enabled: true,
            resume_time_secs: 0.0,
            theme: None,
        }
    }
}

/// Normalized progress observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub current_time: f64,
    pub duration: f64,
    /// Always within [0, 100]
    pub percent: f64,
}

impl ProgressUpdate {
    /// Build a progress update from a raw (time, duration) pair.
    ///
    /// Percent is clamped to [0, 100]; a non-positive duration yields 0.
    /// When the remaining time falls below `near_end_threshold_secs`,
    /// percent snaps to 100 so completion handling is not defeated by
    /// vendors that stop reporting just short of the end.
    #[must_use]
    pub fn from_time(current_time: f64, duration: f64, near_end_threshold_secs: f64) -> Self {
        let percent = if duration > 0.0 {
            if duration - current_time < near_end_threshold_secs {
                100.0
            } else {
                ((current_time / duration) * 100.0).clamp(0.0, 100.0)
            }
        } else {
            0.0
        };
        Self {
            current_time,
            duration,
            percent,
        }
    }
}

/// Canonical player event, producible only by a provider adapter from a
/// raw vendor payload. Unknown payload shapes yield no events, never an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started,
    Progress(ProgressUpdate),
    EpisodeChange(EpisodeRef),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        let p = ProgressUpdate::from_time(5000.0, 100.0, 1.0);
        assert_eq!(p.percent, 100.0);
        let p = ProgressUpdate::from_time(-3.0, 100.0, 1.0);
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn zero_duration_yields_zero_percent() {
        let p = ProgressUpdate::from_time(42.0, 0.0, 1.0);
        assert_eq!(p.percent, 0.0);
        let p = ProgressUpdate::from_time(42.0, -1.0, 1.0);
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn near_end_snaps_to_hundred() {
        let p = ProgressUpdate::from_time(99.2, 100.0, 1.0);
        assert_eq!(p.percent, 100.0);
        // Outside the threshold: no snapping
        let p = ProgressUpdate::from_time(98.0, 100.0, 1.0);
        assert!(p.percent < 100.0);
    }
}
