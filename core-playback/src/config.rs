//! # Playback Timings
//!
//! Polling periods and timeouts used by the adapters and the coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timer settings for one playback session.
///
/// The defaults match what the vendor players tolerate in practice; tests
/// shrink them or drive them with a paused tokio clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackTimings {
    /// YouTube position/duration poll while playing.
    ///
    /// Default: 500ms.
    #[serde(default = "default_youtube_poll_interval")]
    pub youtube_poll_interval: Duration,

    /// How often to check whether a vendor SDK script has loaded.
    ///
    /// Default: 500ms.
    #[serde(default = "default_sdk_poll_interval")]
    pub sdk_poll_interval: Duration,

    /// Seek detector sampling period.
    ///
    /// Default: 250ms.
    #[serde(default = "default_seek_tick_interval")]
    pub seek_tick_interval: Duration,

    /// Drift between expected and reported position, in seconds, that
    /// counts as a seek.
    ///
    /// Default: 0.5.
    #[serde(default = "default_seek_jump_threshold")]
    pub seek_jump_threshold: f64,

    /// SoundCloud load watchdog.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_soundcloud_load_timeout")]
    pub soundcloud_load_timeout: Duration,

    /// Delay between an auto-skippable error and advancing.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_auto_skip_delay")]
    pub auto_skip_delay: Duration,

    /// A paused Spotify state this close to the end counts as finished.
    ///
    /// Default: 1000ms.
    #[serde(default = "default_spotify_end_margin")]
    pub spotify_end_margin: Duration,

    /// Spotify player state poll.
    ///
    /// Default: 1000ms.
    #[serde(default = "default_spotify_poll_interval")]
    pub spotify_poll_interval: Duration,

    /// Devices poll after Connect reports no active device.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_spotify_device_poll_interval")]
    pub spotify_device_poll_interval: Duration,

    /// Devices polls before a play request gives up.
    ///
    /// Default: 10.
    #[serde(default = "default_spotify_device_poll_attempts")]
    pub spotify_device_poll_attempts: u32,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            youtube_poll_interval: default_youtube_poll_interval(),
            sdk_poll_interval: default_sdk_poll_interval(),
            seek_tick_interval: default_seek_tick_interval(),
            seek_jump_threshold: default_seek_jump_threshold(),
            soundcloud_load_timeout: default_soundcloud_load_timeout(),
            auto_skip_delay: default_auto_skip_delay(),
            spotify_end_margin: default_spotify_end_margin(),
            spotify_poll_interval: default_spotify_poll_interval(),
            spotify_device_poll_interval: default_spotify_device_poll_interval(),
            spotify_device_poll_attempts: default_spotify_device_poll_attempts(),
        }
    }
}

impl PlaybackTimings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        let intervals = [
            ("youtube_poll_interval", self.youtube_poll_interval),
            ("sdk_poll_interval", self.sdk_poll_interval),
            ("seek_tick_interval", self.seek_tick_interval),
            ("spotify_poll_interval", self.spotify_poll_interval),
            ("spotify_device_poll_interval", self.spotify_device_poll_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(format!("{} must be > 0", name));
            }
        }

        if !self.seek_jump_threshold.is_finite() || self.seek_jump_threshold <= 0.0 {
            return Err("seek_jump_threshold must be > 0".to_string());
        }

        if self.soundcloud_load_timeout.is_zero() {
            return Err("soundcloud_load_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_youtube_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_sdk_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_seek_tick_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_seek_jump_threshold() -> f64 {
    0.5
}

fn default_soundcloud_load_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_auto_skip_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_spotify_end_margin() -> Duration {
    Duration::from_millis(1000)
}

fn default_spotify_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_spotify_device_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_spotify_device_poll_attempts() -> u32 {
    10
}
