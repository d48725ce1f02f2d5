//! # Track Model
//!
//! A [`Track`] is split in two: the [`PlayableTrack`] the coordinator and
//! adapters work with, and an optional [`TrackDecoration`] that the feed
//! layer attaches for display. Playback never reads the decoration.

use core_resolver::ResolvedPlatform;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform a track is played through.
///
/// `Songlink` and `AppleMusic` have no player of their own; their adapters
/// resolve the link and rewrite the track to one of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    Youtube,
    Spotify,
    Soundcloud,
    Songlink,
    AppleMusic,
}

impl TrackSource {
    pub const ALL: [TrackSource; 5] = [
        TrackSource::Youtube,
        TrackSource::Spotify,
        TrackSource::Soundcloud,
        TrackSource::Songlink,
        TrackSource::AppleMusic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Youtube => "youtube",
            TrackSource::Spotify => "spotify",
            TrackSource::Soundcloud => "soundcloud",
            TrackSource::Songlink => "songlink",
            TrackSource::AppleMusic => "apple_music",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|source| source.as_str() == value)
    }

    /// True for sources that must be resolved before anything can play.
    pub fn needs_resolution(&self) -> bool {
        matches!(self, TrackSource::Songlink | TrackSource::AppleMusic)
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResolvedPlatform> for TrackSource {
    fn from(platform: ResolvedPlatform) -> Self {
        match platform {
            ResolvedPlatform::Youtube => TrackSource::Youtube,
            ResolvedPlatform::Spotify => TrackSource::Spotify,
            ResolvedPlatform::Soundcloud => TrackSource::Soundcloud,
        }
    }
}

/// What the player needs to know about a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayableTrack {
    pub id: String,
    pub source: TrackSource,
    /// Platform-native identifier: a video id, a Spotify id or URI, a
    /// SoundCloud URL/path/short code, or a song.link slug.
    pub source_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Original link as posted; resolving sources prefer it over `source_id`.
    #[serde(default)]
    pub url: Option<String>,
    /// Set when the track was rewritten by resolution.
    #[serde(default)]
    pub original_source: Option<TrackSource>,
    /// Advisory display duration, e.g. `"3:45"`.
    #[serde(default)]
    pub duration: Option<String>,
}

impl PlayableTrack {
    pub fn new(
        id: impl Into<String>,
        source: TrackSource,
        source_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            source_id: source_id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail: None,
            url: None,
            original_source: None,
            duration: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Social metadata carried alongside a track for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDecoration {
    #[serde(default)]
    pub added_by: String,
    #[serde(default)]
    pub user_avatar: String,
    #[serde(default)]
    pub user_fid: String,
    #[serde(default)]
    pub cast_hash: Option<String>,
    /// Unix ms the track was shared.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub replies: u32,
    #[serde(default)]
    pub recasts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(flatten)]
    pub playable: PlayableTrack,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoration: Option<TrackDecoration>,
}

impl Track {
    pub fn new(playable: PlayableTrack) -> Self {
        Self {
            playable,
            decoration: None,
        }
    }

    pub fn with_decoration(mut self, decoration: TrackDecoration) -> Self {
        self.decoration = Some(decoration);
        self
    }

    pub fn id(&self) -> &str {
        &self.playable.id
    }

    pub fn source(&self) -> TrackSource {
        self.playable.source
    }
}

impl From<PlayableTrack> for Track {
    fn from(playable: PlayableTrack) -> Self {
        Track::new(playable)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    /// none → all → one → none
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }
}
