//! YouTube IFrame Player API surface.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

/// Player states reported through `onStateChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubePlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl YouTubePlayerState {
    /// Map the numeric `YT.PlayerState` value.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YouTubeEvent {
    /// `onReady`
    Ready,
    /// `onStateChange`
    StateChange(YouTubePlayerState),
    /// `onError` with the vendor error code (2, 5, 100, 101, 150).
    Error(i32),
}

/// Loader for `window.YT`.
#[async_trait]
pub trait YouTubeIframeApi: Send + Sync {
    /// Whether `YT.Player` is loaded. The script loads asynchronously, so
    /// callers poll this.
    fn is_available(&self) -> bool;

    /// Construct a player. Events are delivered on `events` until
    /// [`YouTubePlayer::destroy`] is called.
    async fn create_player(
        &self,
        events: UnboundedSender<YouTubeEvent>,
    ) -> Result<Box<dyn YouTubePlayer>>;
}

/// One `YT.Player` instance.
#[async_trait]
pub trait YouTubePlayer: Send + Sync {
    /// Load and start a video.
    async fn load_video_by_id(&self, video_id: &str) -> Result<()>;

    /// Load a video without starting it.
    async fn cue_video_by_id(&self, video_id: &str) -> Result<()>;

    async fn play_video(&self) -> Result<()>;

    async fn pause_video(&self) -> Result<()>;

    async fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<()>;

    /// `getCurrentTime()` in seconds.
    async fn current_time(&self) -> Result<f64>;

    /// `getDuration()` in seconds, 0 until metadata is known.
    async fn duration(&self) -> Result<f64>;

    async fn destroy(&self) -> Result<()>;
}
