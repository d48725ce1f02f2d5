//! # Platform Adapter Contract
//!
//! Each adapter owns exactly one vendor player and runs as its own tokio
//! task for as long as it is mounted. It talks to the coordinator only
//! through the [`AdapterContext`] it is handed:
//!
//! ```text
//!              LoadRequest (watch)        PlayerView (watch)
//!  Coordinator ─────────────────────┐   ┌──────────────────── Coordinator
//!                                   v   v
//!                            ┌──────────────────┐  SDK calls  ┌────────────┐
//!                            │  PlatformAdapter ├────────────>│ vendor SDK │
//!                            │    (tokio task)  │<────────────┤            │
//!                            └───────┬──────────┘ SDK events  └────────────┘
//!                                    │ SourcedEvent (mpsc)
//!                                    v
//!                               Coordinator reducer
//! ```
//!
//! ## Lifecycle
//!
//! 1. Emit `Ready(false)` and start vendor initialization.
//! 2. Once the vendor reports ready, emit `Ready(true)` and register
//!    transport controls with [`AdapterContext::register_controls`].
//! 3. Load every new [`LoadRequest`] whose source matches, skipping
//!    requests already loaded (same id and generation).
//! 4. Report failures with [`AdapterContext::report_error`].
//! 5. When the cancellation token fires, release the vendor player and
//!    return. Nothing may be emitted afterwards.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use core_resolver::Resolution;

use crate::error::PlaybackError;
use crate::store::PlayerView;
use crate::types::{PlayableTrack, TrackSource};

/// Track an adapter should have loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub track: PlayableTrack,
    /// Bumped when the same track must be reloaded (repeat-one).
    pub generation: u64,
    pub autoplay: bool,
}

impl LoadRequest {
    /// Identity used for redundant-load suppression.
    pub fn key(&self) -> (String, u64) {
        (self.track.source_id.clone(), self.generation)
    }
}

/// Commands sent to an adapter through its registered controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdapterCommand {
    Toggle,
    /// Seconds.
    Seek(f64),
    Pause,
}

/// Opaque handle the coordinator uses to drive the active adapter.
#[cfg_attr(test, mockall::automock)]
pub trait TransportControls: Send + Sync {
    fn toggle(&self);
    fn seek(&self, seconds: f64);
    fn pause(&self);
}

/// [`TransportControls`] that forward into an adapter's command queue.
///
/// Commands sent after the adapter is gone are dropped.
#[derive(Clone)]
pub struct ChannelControls {
    commands: mpsc::UnboundedSender<AdapterCommand>,
}

impl ChannelControls {
    pub fn new(commands: mpsc::UnboundedSender<AdapterCommand>) -> Self {
        Self { commands }
    }

    fn send(&self, command: AdapterCommand) {
        if self.commands.send(command).is_err() {
            debug!(?command, "Adapter gone, command dropped");
        }
    }
}

impl TransportControls for ChannelControls {
    fn toggle(&self) {
        self.send(AdapterCommand::Toggle);
    }

    fn seek(&self, seconds: f64) {
        self.send(AdapterCommand::Seek(seconds));
    }

    fn pause(&self) {
        self.send(AdapterCommand::Pause);
    }
}

/// Typed events an adapter reports.
#[derive(Clone)]
pub enum AdapterEvent {
    Ready(bool),
    ControlsRegistered(Arc<dyn TransportControls>),
    Playing,
    Paused,
    Ended,
    /// Seconds; `None` leaves the stored value alone.
    Progress {
        position: Option<f64>,
        duration: Option<f64>,
    },
    Seekable(bool),
    Error(PlaybackError),
    /// A resolving adapter found a playable link.
    Resolved(Resolution),
    /// A resolving adapter gave up; the UI offers `external_url`.
    Unresolvable {
        error: PlaybackError,
        external_url: String,
    },
}

impl fmt::Debug for AdapterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterEvent::Ready(ready) => f.debug_tuple("Ready").field(ready).finish(),
            AdapterEvent::ControlsRegistered(_) => f.write_str("ControlsRegistered"),
            AdapterEvent::Playing => f.write_str("Playing"),
            AdapterEvent::Paused => f.write_str("Paused"),
            AdapterEvent::Ended => f.write_str("Ended"),
            AdapterEvent::Progress { position, duration } => f
                .debug_struct("Progress")
                .field("position", position)
                .field("duration", duration)
                .finish(),
            AdapterEvent::Seekable(seekable) => f.debug_tuple("Seekable").field(seekable).finish(),
            AdapterEvent::Error(error) => f.debug_tuple("Error").field(error).finish(),
            AdapterEvent::Resolved(resolution) => {
                f.debug_tuple("Resolved").field(resolution).finish()
            }
            AdapterEvent::Unresolvable {
                error,
                external_url,
            } => f
                .debug_struct("Unresolvable")
                .field("error", error)
                .field("external_url", external_url)
                .finish(),
        }
    }
}

/// An [`AdapterEvent`] tagged with the mount that produced it.
#[derive(Debug, Clone)]
pub struct SourcedEvent {
    pub source: TrackSource,
    pub mount_id: u64,
    pub event: AdapterEvent,
}

/// Everything a mounted adapter gets from the coordinator.
pub struct AdapterContext {
    pub source: TrackSource,
    pub mount_id: u64,
    events: mpsc::UnboundedSender<SourcedEvent>,
    pub loads: watch::Receiver<Option<LoadRequest>>,
    pub view: watch::Receiver<PlayerView>,
    pub cancel: CancellationToken,
}

impl AdapterContext {
    pub fn new(
        source: TrackSource,
        mount_id: u64,
        events: mpsc::UnboundedSender<SourcedEvent>,
        loads: watch::Receiver<Option<LoadRequest>>,
        view: watch::Receiver<PlayerView>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            mount_id,
            events,
            loads,
            view,
            cancel,
        }
    }

    /// Send an event to the coordinator. Suppressed after cancellation so a
    /// torn-down adapter can never write state.
    pub fn emit(&self, event: AdapterEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.events.send(SourcedEvent {
            source: self.source,
            mount_id: self.mount_id,
            event,
        });
    }

    pub fn ready(&self, ready: bool) {
        self.emit(AdapterEvent::Ready(ready));
    }

    pub fn report_error(&self, error: PlaybackError) {
        self.emit(AdapterEvent::Error(error));
    }

    /// Register toggle/seek/pause with the coordinator and return the
    /// queue they feed.
    pub fn register_controls(&self) -> mpsc::UnboundedReceiver<AdapterCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.emit(AdapterEvent::ControlsRegistered(Arc::new(
            ChannelControls::new(tx),
        )));
        rx
    }

    /// The store's `isPlaying` as last published.
    pub fn is_playing(&self) -> bool {
        self.view.borrow().is_playing
    }

    /// Latest load request for this adapter's source, marking it seen.
    pub fn take_load(&mut self) -> Option<LoadRequest> {
        let source = self.source;
        self.loads
            .borrow_and_update()
            .clone()
            .filter(|request| request.track.source == source)
    }
}

/// One vendor player integration.
///
/// `run` is called once per mount and returns after teardown.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn source(&self) -> TrackSource;

    async fn run(&self, ctx: AdapterContext);
}

/// Wait for the next command, or forever when there is no queue yet.
pub(crate) async fn next_command(
    commands: &mut Option<mpsc::UnboundedReceiver<AdapterCommand>>,
) -> Option<AdapterCommand> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// True if a `Pause` was queued and not yet handled. The coordinator
/// pauses an adapter right before cancelling it, so teardown checks this.
pub(crate) fn take_queued_pause(
    commands: &mut Option<mpsc::UnboundedReceiver<AdapterCommand>>,
) -> bool {
    let Some(rx) = commands.as_mut() else {
        return false;
    };
    let mut paused = false;
    while let Ok(command) = rx.try_recv() {
        paused |= command == AdapterCommand::Pause;
    }
    paused
}

/// Wait until a deadline, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Poll `available` every `interval` until it holds. Returns false if
/// cancelled first.
pub(crate) async fn wait_until_available(
    cancel: &CancellationToken,
    interval: std::time::Duration,
    available: impl Fn() -> bool,
) -> bool {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = ticker.tick() => {
                if available() {
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> (
        AdapterContext,
        mpsc::UnboundedReceiver<SourcedEvent>,
        watch::Sender<Option<LoadRequest>>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (loads_tx, loads_rx) = watch::channel(None);
        let (_view_tx, view_rx) = watch::channel(PlayerView::default());
        let ctx = AdapterContext::new(
            TrackSource::Youtube,
            7,
            events_tx,
            loads_rx,
            view_rx,
            CancellationToken::new(),
        );
        (ctx, events_rx, loads_tx)
    }

    #[tokio::test]
    async fn test_events_are_tagged_with_mount() {
        let (ctx, mut events, _loads) = context();
        ctx.ready(true);
        let event = events.recv().await.unwrap();
        assert_eq!(event.mount_id, 7);
        assert_eq!(event.source, TrackSource::Youtube);
        assert!(matches!(event.event, AdapterEvent::Ready(true)));
    }

    #[tokio::test]
    async fn test_nothing_is_emitted_after_cancel() {
        let (ctx, mut events, _loads) = context();
        ctx.cancel.cancel();
        ctx.report_error(PlaybackError::SoundCloudUnavailable);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_registered_controls_feed_the_queue() {
        let (ctx, mut events, _loads) = context();
        let mut commands = ctx.register_controls();
        let controls = match events.recv().await.unwrap().event {
            AdapterEvent::ControlsRegistered(controls) => controls,
            other => panic!("unexpected {:?}", other),
        };

        controls.toggle();
        controls.seek(12.5);
        controls.pause();
        assert_eq!(commands.recv().await, Some(AdapterCommand::Toggle));
        assert_eq!(commands.recv().await, Some(AdapterCommand::Seek(12.5)));
        assert_eq!(commands.recv().await, Some(AdapterCommand::Pause));
    }

    #[test]
    fn test_take_queued_pause() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut commands = Some(rx);
        assert!(!take_queued_pause(&mut commands));

        tx.send(AdapterCommand::Seek(3.0)).unwrap();
        tx.send(AdapterCommand::Pause).unwrap();
        assert!(take_queued_pause(&mut commands));
        assert!(!take_queued_pause(&mut commands));
        assert!(!take_queued_pause(&mut None));
    }

    #[tokio::test]
    async fn test_take_load_filters_other_sources() {
        let (mut ctx, _events, loads) = context();
        let spotify = PlayableTrack::new("t", TrackSource::Spotify, "sp", "T", "A");
        loads
            .send(Some(LoadRequest {
                track: spotify,
                generation: 0,
                autoplay: true,
            }))
            .unwrap();
        assert!(ctx.take_load().is_none());

        let youtube = PlayableTrack::new("t", TrackSource::Youtube, "yt", "T", "A");
        loads
            .send(Some(LoadRequest {
                track: youtube,
                generation: 1,
                autoplay: false,
            }))
            .unwrap();
        let request = ctx.take_load().unwrap();
        assert_eq!(request.key(), ("yt".to_string(), 1));
    }
}
