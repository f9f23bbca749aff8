use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub sync: SyncConfig,
    pub lock: LockConfig,
    pub progress: ProgressConfig,
    pub safeguard: SafeguardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Episode-sync state machine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds of real playback that must be observed after a target
    /// change before player-reported episode changes are acted on.
    /// Guards against stale echoes from the just-replaced iframe.
    pub nav_suppression_secs: f64,
    /// Playback time past which the one-shot history entry fires
    pub history_min_secs: f64,
    /// Percent past which the one-shot history entry fires
    pub history_min_percent: f64,
    /// Continue-watching window: upsert while within, remove past the top
    pub continue_watching_min_percent: f64,
    pub continue_watching_max_percent: f64,
    /// Minimum playback time before auto-next may fire, guards against
    /// bogus zero or near-zero durations reported at load.
    pub auto_next_min_secs: f64,
    /// User-level override for the completion threshold; providers carry
    /// their own default (just under 100 to tolerate float jitter).
    pub auto_next_threshold_override: Option<f64>,
    /// Bound of the inbound message channel per session
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            nav_suppression_secs: 5.0,
            history_min_secs: 30.0,
            history_min_percent: 5.0,
            continue_watching_min_percent: 5.0,
            continue_watching_max_percent: 95.0,
            auto_next_min_secs: 30.0,
            auto_next_threshold_override: None,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Watchdog after which a never-released auto-next lock is force-cleared
    pub watchdog_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { watchdog_secs: 10 }
    }
}

impl LockConfig {
    #[must_use]
    pub const fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Durable writes are coalesced and flushed at most once per interval
    pub flush_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1_000,
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeguardConfig {
    /// Positions below this are never saved
    pub min_progress_to_save_secs: f64,
    /// Saved position must exceed current by this much to offer recovery
    pub loss_threshold_secs: f64,
    /// Updates below this are suspect when real progress was already saved
    pub reset_protection_threshold_secs: f64,
    /// Minimum movement before a new position is persisted
    pub min_delta_secs: f64,
}

impl Default for SafeguardConfig {
    fn default() -> Self {
        Self {
            min_progress_to_save_secs: 10.0,
            loss_threshold_secs: 60.0,
            reset_protection_threshold_secs: 30.0,
            min_delta_secs: 5.0,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (EMBEDSYNC_SYNC_NAV_SUPPRESSION_SECS, etc.)
        builder = builder.add_source(
            Environment::with_prefix("EMBEDSYNC")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }
}
