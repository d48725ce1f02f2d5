//! # Playback State Store
//!
//! The single mutable source of truth for one playback session: the
//! current track, the registered playlist contexts, transport state and the
//! last error. It knows nothing about vendor players; the coordinator is
//! the only writer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{RepeatMode, Track};

/// Read-only snapshot published to adapters and UI shells.
///
/// Transport fields are meaningless while `current_track` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    /// Seconds.
    pub current_time: f64,
    /// Seconds; 0 until the player reports it.
    pub duration: f64,
    pub is_seekable: bool,
    pub error: Option<String>,
    pub shuffle_mode: bool,
    pub repeat_mode: RepeatMode,
    pub active_feed: Option<String>,
    pub current_index: Option<usize>,
    pub playlist_len: usize,
    /// Whether the mounted adapter can take commands.
    pub player_ready: bool,
    /// Link to offer when a track could not be resolved to a local player.
    pub external_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct PlaybackStore {
    current_track: Option<Track>,
    contexts: HashMap<String, Vec<Track>>,
    active_feed: Option<String>,
    is_playing: bool,
    current_time: f64,
    duration: f64,
    is_seekable: bool,
    error: Option<String>,
    shuffle_mode: bool,
    repeat_mode: RepeatMode,
}

impl PlaybackStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Track selection
    // ------------------------------------------------------------------------

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    /// Replace the current track. Returns true when the track identity
    /// changed, in which case time, duration and seekability start over.
    pub fn set_current_track(&mut self, track: Option<Track>) -> bool {
        let changed = self.current_track.as_ref().map(Track::id) != track.as_ref().map(Track::id);
        if changed {
            self.current_time = 0.0;
            self.duration = 0.0;
            self.is_seekable = false;
        }
        self.current_track = track;
        changed
    }

    /// Register `tracks` under `feed_id`, replacing any previous sequence.
    pub fn set_playlist(&mut self, feed_id: impl Into<String>, tracks: Vec<Track>) {
        self.contexts.insert(feed_id.into(), tracks);
    }

    pub fn set_active_feed(&mut self, feed_id: Option<String>) {
        self.active_feed = feed_id;
    }

    pub fn active_feed(&self) -> Option<&str> {
        self.active_feed.as_deref()
    }

    /// Tracks of the active context; empty when there is none.
    pub fn current_playlist_tracks(&self) -> &[Track] {
        self.active_feed
            .as_ref()
            .and_then(|feed| self.contexts.get(feed))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Position of the current track in the active context, by id.
    pub fn current_track_index(&self) -> Option<usize> {
        let current = self.current_track.as_ref()?;
        self.current_playlist_tracks()
            .iter()
            .position(|track| track.id() == current.id())
    }

    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.current_playlist_tracks().get(index)
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn set_is_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn set_current_time(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.current_time = seconds;
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn set_duration(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.duration = seconds;
        }
    }

    pub fn is_seekable(&self) -> bool {
        self.is_seekable
    }

    pub fn set_seekable(&mut self, seekable: bool) {
        self.is_seekable = seekable;
    }

    // ------------------------------------------------------------------------
    // Error and modes
    // ------------------------------------------------------------------------

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_player_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn shuffle_mode(&self) -> bool {
        self.shuffle_mode
    }

    pub fn set_shuffle_mode(&mut self, enabled: bool) {
        self.shuffle_mode = enabled;
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// Snapshot for publishing. Readiness and the external link live on
    /// the coordinator and are passed in.
    pub fn view(&self, player_ready: bool, external_url: Option<String>) -> PlayerView {
        PlayerView {
            current_track: self.current_track.clone(),
            is_playing: self.is_playing,
            current_time: self.current_time,
            duration: self.duration,
            is_seekable: self.is_seekable,
            error: self.error.clone(),
            shuffle_mode: self.shuffle_mode,
            repeat_mode: self.repeat_mode,
            active_feed: self.active_feed.clone(),
            current_index: self.current_track_index(),
            playlist_len: self.current_playlist_tracks().len(),
            player_ready,
            external_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayableTrack, TrackSource};

    fn track(id: &str) -> Track {
        Track::new(PlayableTrack::new(id, TrackSource::Youtube, id, id, "artist"))
    }

    #[test]
    fn test_index_follows_active_feed() {
        let mut store = PlaybackStore::new();
        store.set_playlist("home", vec![track("a"), track("b")]);
        store.set_playlist("profile", vec![track("b"), track("c")]);
        store.set_current_track(Some(track("b")));

        assert_eq!(store.current_track_index(), None);
        store.set_active_feed(Some("home".to_string()));
        assert_eq!(store.current_track_index(), Some(1));
        store.set_active_feed(Some("profile".to_string()));
        assert_eq!(store.current_track_index(), Some(0));
        assert_eq!(store.current_playlist_tracks().len(), 2);
    }

    #[test]
    fn test_changing_track_resets_transport() {
        let mut store = PlaybackStore::new();
        assert!(store.set_current_track(Some(track("a"))));
        store.set_current_time(42.0);
        store.set_duration(180.0);
        store.set_seekable(true);

        // Same identity, e.g. a resolution rewrite: transport survives.
        let mut rewritten = track("a");
        rewritten.playable.source = TrackSource::Spotify;
        assert!(!store.set_current_track(Some(rewritten)));
        assert_eq!(store.current_time(), 42.0);

        assert!(store.set_current_track(Some(track("b"))));
        assert_eq!(store.current_time(), 0.0);
        assert_eq!(store.duration(), 0.0);
        assert!(!store.is_seekable());
    }

    #[test]
    fn test_rejects_garbage_positions() {
        let mut store = PlaybackStore::new();
        store.set_current_time(10.0);
        store.set_current_time(f64::NAN);
        store.set_current_time(-1.0);
        assert_eq!(store.current_time(), 10.0);
    }

    #[test]
    fn test_view_snapshot() {
        let mut store = PlaybackStore::new();
        store.set_playlist("home", vec![track("a"), track("b"), track("c")]);
        store.set_active_feed(Some("home".to_string()));
        store.set_current_track(Some(track("c")));
        store.set_player_error(Some("boom".to_string()));

        let view = store.view(true, None);
        assert_eq!(view.current_index, Some(2));
        assert_eq!(view.playlist_len, 3);
        assert_eq!(view.error.as_deref(), Some("boom"));
        assert!(view.player_ready);
    }
}
