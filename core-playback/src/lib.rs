//! # Multi-Source Playback
//!
//! One continuous, controllable playlist over tracks that live on
//! mutually incompatible vendor players.
//!
//! ## Overview
//!
//! This crate handles:
//! - The playback state store and next/previous/shuffle/repeat navigation
//! - The platform adapter contract and the YouTube, Spotify, SoundCloud,
//!   song.link and Apple Music adapters
//! - The coordinator that mounts one adapter at a time and reduces their
//!   events into a single player state
//! - Resuming the pending track after the Spotify sign-in redirect

pub mod adapter;
pub mod adapters;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod navigation;
pub mod recovery;
pub mod seek_detector;
pub mod store;
pub mod types;

pub use adapter::{
    AdapterCommand, AdapterContext, AdapterEvent, LoadRequest, PlatformAdapter, SourcedEvent,
    TransportControls,
};
pub use catalog::{HttpTrackCatalog, TrackCatalog};
pub use config::PlaybackTimings;
pub use coordinator::{PlaybackCoordinator, PlayerCommand, PlayerHandle};
pub use error::{PlaybackError, Result};
pub use navigation::{allows_autoplay, NavigationOutcome, Navigator};
pub use recovery::{FeedPlayback, PendingTrackRecovery};
pub use seek_detector::SeekDetector;
pub use store::{PlaybackStore, PlayerView};
pub use types::{PlayableTrack, RepeatMode, Track, TrackDecoration, TrackSource};
