//! Spotify Web Playback SDK surface.
//!
//! Only device lifecycle and local transport live here. Starting a specific
//! track on the device goes through the Connect REST API, which the core
//! calls itself over [`HttpClient`](crate::http::HttpClient).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

/// Subset of `WebPlaybackState` the player cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyPlaybackState {
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub track_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifySdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    InitializationError(String),
    AuthenticationError(String),
    AccountError(String),
    PlaybackError(String),
    /// `player_state_changed`; `None` when this device is no longer active.
    PlayerStateChanged(Option<SpotifyPlaybackState>),
}

/// Loader for `window.Spotify`.
#[async_trait]
pub trait SpotifyWebPlaybackSdk: Send + Sync {
    fn is_available(&self) -> bool;

    /// `new Spotify.Player({ name, getOAuthToken, volume })`.
    async fn create_player(
        &self,
        name: &str,
        access_token: String,
        volume: f32,
        events: UnboundedSender<SpotifySdkEvent>,
    ) -> Result<Box<dyn SpotifyWebPlayer>>;
}

#[async_trait]
pub trait SpotifyWebPlayer: Send + Sync {
    /// Returns false when the SDK refused to connect.
    async fn connect(&self) -> Result<bool>;

    /// `getCurrentState()`
    async fn current_state(&self) -> Result<Option<SpotifyPlaybackState>>;

    async fn resume(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}
