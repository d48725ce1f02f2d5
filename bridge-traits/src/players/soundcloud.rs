//! SoundCloud Widget API surface.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum SoundCloudWidgetEvent {
    /// `SC.Widget.Events.READY`
    Ready,
    /// Callback passed to `widget.load()` fired.
    LoadComplete,
    Play,
    Pause,
    Finish,
    Error,
    /// `PLAY_PROGRESS` with `currentPosition` in milliseconds.
    PlayProgress { position_ms: f64 },
}

/// Loader for `window.SC`.
#[async_trait]
pub trait SoundCloudWidgetApi: Send + Sync {
    fn is_available(&self) -> bool;

    /// Bind `SC.Widget` to a fresh iframe pointing at `initial_url`.
    async fn create_widget(
        &self,
        initial_url: &str,
        events: UnboundedSender<SoundCloudWidgetEvent>,
    ) -> Result<Box<dyn SoundCloudWidget>>;
}

#[async_trait]
pub trait SoundCloudWidget: Send + Sync {
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek_to(&self, position_ms: f64) -> Result<()>;

    /// Returns once the load was requested; completion is signalled by
    /// [`SoundCloudWidgetEvent::LoadComplete`].
    async fn load(&self, url: &str, auto_play: bool) -> Result<()>;

    /// `getDuration()` in milliseconds.
    async fn duration_ms(&self) -> Result<f64>;

    async fn is_paused(&self) -> Result<bool>;

    /// Unbind all event listeners and drop the iframe.
    async fn unbind(&self) -> Result<()>;
}
