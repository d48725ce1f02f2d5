//! Workspace umbrella crate.
//!
//! Host applications can depend on `msp-workspace` with the `desktop-shims`
//! feature instead of wiring `core-service` and `core-playback` one by one.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, PlayerSdks, PlayerService, Result};

#[cfg(feature = "desktop-shims")]
pub use core_playback::{
    PlaybackTimings, PlayerHandle, PlayerView, RepeatMode, Track, TrackDecoration, TrackSource,
};
