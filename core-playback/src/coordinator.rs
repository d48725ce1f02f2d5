//! # Playback Coordinator
//!
//! One [`PlaybackCoordinator`] per playback session. It owns the
//! [`PlaybackStore`], decides which adapter is mounted from the current
//! track's source and funnels every adapter report through a single reducer.
//!
//! ## Overview
//!
//! - UI commands arrive through a [`PlayerHandle`] as [`PlayerCommand`]s.
//! - Adapters run as their own tokio tasks and report [`SourcedEvent`]s.
//!   Events from anything but the active mount are dropped, so a torn-down
//!   adapter can never write transport state.
//! - Before mounting a different source, the previous adapter's `pause()`
//!   is called. Only one vendor player is ever audible.
//! - The current [`PlayerView`] is published on a `watch` channel after
//!   every mutation; adapters read `is_playing` from it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{PlaybackCoordinator, PlaybackTimings};
//!
//! let handle = PlaybackCoordinator::new(PlaybackTimings::default())
//!     .with_adapter(youtube)
//!     .with_adapter(spotify)
//!     .spawn();
//!
//! handle.play_track_from_feed(track.clone(), feed_tracks, "home".into())?;
//! handle.toggle_play()?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use core_resolver::{ResolvedLink, Resolution};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{
    sleep_until_opt, AdapterContext, AdapterEvent, LoadRequest, PlatformAdapter, SourcedEvent,
    TransportControls,
};
use crate::config::PlaybackTimings;
use crate::error::{PlaybackError, Result};
use crate::navigation::{allows_autoplay, NavigationOutcome, Navigator};
use crate::recovery::FeedPlayback;
use crate::store::{PlaybackStore, PlayerView};
use crate::types::{RepeatMode, Track, TrackSource};

/// Requests a [`PlayerHandle`] sends to the coordinator.
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    PlayTrackFromFeed {
        track: Track,
        feed_tracks: Vec<Track>,
        feed_id: String,
    },
    TogglePlay,
    /// Seconds.
    Seek(f64),
    NextTrack,
    PreviousTrack,
    SetShuffleMode(bool),
    SetRepeatMode(RepeatMode),
    HandleTrackError {
        message: String,
        auto_skip: bool,
    },
    ClosePlayer,
}

/// Cloneable front end of a running coordinator.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    view: watch::Receiver<PlayerView>,
    shutdown: CancellationToken,
}

impl PlayerHandle {
    fn send(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::CoordinatorStopped)
    }

    /// Register `feed_tracks` under `feed_id`, make it the active context
    /// and start `track` under the autoplay policy.
    pub fn play_track_from_feed(
        &self,
        track: Track,
        feed_tracks: Vec<Track>,
        feed_id: String,
    ) -> Result<()> {
        self.send(PlayerCommand::PlayTrackFromFeed {
            track,
            feed_tracks,
            feed_id,
        })
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.send(PlayerCommand::TogglePlay)
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(PlayerCommand::Seek(seconds))
    }

    pub fn next_track(&self) -> Result<()> {
        self.send(PlayerCommand::NextTrack)
    }

    pub fn previous_track(&self) -> Result<()> {
        self.send(PlayerCommand::PreviousTrack)
    }

    pub fn set_shuffle_mode(&self, enabled: bool) -> Result<()> {
        self.send(PlayerCommand::SetShuffleMode(enabled))
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.send(PlayerCommand::SetRepeatMode(mode))
    }

    pub fn handle_track_error(&self, message: impl Into<String>, auto_skip: bool) -> Result<()> {
        self.send(PlayerCommand::HandleTrackError {
            message: message.into(),
            auto_skip,
        })
    }

    pub fn close_player(&self) -> Result<()> {
        self.send(PlayerCommand::ClosePlayer)
    }

    /// Latest published state.
    pub fn view(&self) -> PlayerView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerView> {
        self.view.clone()
    }

    /// Stop the coordinator loop. The mounted adapter is torn down.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl FeedPlayback for PlayerHandle {
    fn play_track_from_feed(&self, track: Track, feed_tracks: Vec<Track>, feed_id: String) -> Result<()> {
        PlayerHandle::play_track_from_feed(self, track, feed_tracks, feed_id)
    }
}

struct MountedAdapter {
    source: TrackSource,
    mount_id: u64,
    cancel: CancellationToken,
    loads: watch::Sender<Option<LoadRequest>>,
    controls: Option<Arc<dyn TransportControls>>,
    ready: bool,
    /// Whether this mount ever reported `Playing`; gates the cascade.
    has_played: bool,
}

struct PendingSkip {
    track_id: String,
    deadline: Instant,
}

pub struct PlaybackCoordinator {
    store: PlaybackStore,
    navigator: Navigator,
    timings: PlaybackTimings,
    adapters: HashMap<TrackSource, Arc<dyn PlatformAdapter>>,
    mounted: Option<MountedAdapter>,
    previous_source: Option<TrackSource>,
    next_mount_id: u64,
    /// Bumped to force a reload of an unchanged track.
    generation: u64,
    autoplay: bool,
    pending_skip: Option<PendingSkip>,
    /// Fallback links for the current resolved track, best first.
    cascade: VecDeque<ResolvedLink>,
    external_url: Option<String>,
    view_tx: watch::Sender<PlayerView>,
    events_tx: mpsc::UnboundedSender<SourcedEvent>,
    events_rx: mpsc::UnboundedReceiver<SourcedEvent>,
    commands_tx: mpsc::UnboundedSender<PlayerCommand>,
    commands_rx: mpsc::UnboundedReceiver<PlayerCommand>,
    shutdown: CancellationToken,
    event_bus: Option<EventBus>,
}

impl PlaybackCoordinator {
    pub fn new(timings: PlaybackTimings) -> Self {
        let (view_tx, _) = watch::channel(PlayerView::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            store: PlaybackStore::new(),
            navigator: Navigator::new(),
            timings,
            adapters: HashMap::new(),
            mounted: None,
            previous_source: None,
            next_mount_id: 0,
            generation: 0,
            autoplay: false,
            pending_skip: None,
            cascade: VecDeque::new(),
            external_url: None,
            view_tx,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
            shutdown: CancellationToken::new(),
            event_bus: None,
        }
    }

    /// Register the adapter for its source, replacing any earlier one.
    pub fn with_adapter(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.adapters.insert(adapter.source(), adapter);
        self
    }

    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            commands: self.commands_tx.clone(),
            view: self.view_tx.subscribe(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run on a new tokio task and return its handle.
    pub fn spawn(self) -> PlayerHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    /// Reducer loop. Returns after [`PlayerHandle::shutdown`].
    pub async fn run(mut self) {
        info!("Playback coordinator started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(command) = self.commands_rx.recv() => self.apply(command),
                Some(event) = self.events_rx.recv() => self.on_adapter_event(event),
                _ = sleep_until_opt(self.pending_skip.as_ref().map(|skip| skip.deadline)) => {
                    self.fire_pending_skip();
                }
            }
        }
        self.unmount();
        info!("Playback coordinator stopped");
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn apply(&mut self, command: PlayerCommand) {
        debug!(?command, "Player command");
        match command {
            PlayerCommand::PlayTrackFromFeed {
                track,
                feed_tracks,
                feed_id,
            } => self.play_track_from_feed(track, feed_tracks, feed_id),
            PlayerCommand::TogglePlay => self.toggle_play(),
            PlayerCommand::Seek(seconds) => self.seek(seconds),
            PlayerCommand::NextTrack => self.next_track(),
            PlayerCommand::PreviousTrack => self.previous_track(),
            PlayerCommand::SetShuffleMode(enabled) => self.store.set_shuffle_mode(enabled),
            PlayerCommand::SetRepeatMode(mode) => self.store.set_repeat_mode(mode),
            PlayerCommand::HandleTrackError { message, auto_skip } => {
                self.handle_track_error(message, auto_skip)
            }
            PlayerCommand::ClosePlayer => self.close_player(),
        }
        self.publish();
    }

    fn play_track_from_feed(&mut self, track: Track, feed_tracks: Vec<Track>, feed_id: String) {
        if !feed_tracks.iter().any(|t| t.id() == track.id()) {
            warn!(track_id = %track.id(), feed_id = %feed_id, "Track is not part of its feed");
        }
        self.store.set_playlist(feed_id.clone(), feed_tracks);
        self.store.set_active_feed(Some(feed_id));
        self.select_track(track);
    }

    fn toggle_play(&mut self) {
        match self.active_controls() {
            Some(controls) => controls.toggle(),
            None => debug!("Toggle ignored, player not ready"),
        }
    }

    fn seek(&mut self, seconds: f64) {
        match self.active_controls() {
            Some(controls) => {
                controls.seek(seconds);
                self.store.set_current_time(seconds);
            }
            None => debug!("Seek ignored, player not ready"),
        }
    }

    fn next_track(&mut self) {
        match self.navigator.next(&self.store) {
            NavigationOutcome::Selected { index } => self.select_index(index),
            NavigationOutcome::Replay => self.replay(),
            NavigationOutcome::Stopped => {
                info!("End of playlist");
                if let Some(controls) = self.active_controls() {
                    controls.pause();
                }
                self.set_playing(false);
                if let Some(track) = self.store.current_track() {
                    let track_id = track.id().to_string();
                    self.emit(PlaybackEvent::Stopped { track_id });
                }
            }
            NavigationOutcome::Unchanged => {}
        }
    }

    fn previous_track(&mut self) {
        if let NavigationOutcome::Selected { index } = self.navigator.previous(&self.store) {
            self.select_index(index);
        }
    }

    /// The shared error surface. With `auto_skip` the coordinator moves on
    /// after the configured delay; it never retries the same track.
    fn handle_track_error(&mut self, message: String, auto_skip: bool) {
        let track_id = self.store.current_track().map(|t| t.id().to_string());
        warn!(track_id = ?track_id, %message, auto_skip, "Track error");

        self.store.set_player_error(Some(message.clone()));
        self.set_playing(false);
        if auto_skip {
            if let Some(track_id) = track_id.clone() {
                self.pending_skip = Some(PendingSkip {
                    track_id,
                    deadline: Instant::now() + self.timings.auto_skip_delay,
                });
            }
        }
        self.emit(PlaybackEvent::Error {
            track_id,
            message,
            auto_skip,
        });
    }

    fn close_player(&mut self) {
        if let Some(controls) = self.active_controls() {
            controls.pause();
        }
        self.unmount();
        self.store.set_current_track(None);
        self.store.set_is_playing(false);
        self.store.set_player_error(None);
        self.previous_source = None;
        self.pending_skip = None;
        self.cascade.clear();
        self.external_url = None;
        info!("Player closed");
        self.emit(PlaybackEvent::PlayerClosed);
    }

    // ------------------------------------------------------------------------
    // Track selection
    // ------------------------------------------------------------------------

    fn select_index(&mut self, index: usize) {
        match self.store.track_at(index).cloned() {
            Some(track) => self.select_track(track),
            None => warn!(index, "Navigation index out of range"),
        }
    }

    fn select_track(&mut self, track: Track) {
        let same = self.store.current_track().map(Track::id) == Some(track.id());
        if same {
            self.generation += 1;
        }
        self.cascade.clear();
        // Any move supersedes a scheduled skip.
        self.pending_skip = None;

        let autoplay = allows_autoplay(track.source(), self.store.active_feed().is_some());
        let event = PlaybackEvent::TrackChanged {
            track_id: track.id().to_string(),
            source: track.source().to_string(),
            title: track.playable.title.clone(),
            autoplay,
        };

        if self.store.set_current_track(Some(track)) {
            self.external_url = None;
            self.store.set_player_error(None);
        }
        self.autoplay = autoplay;
        self.store.set_is_playing(autoplay);
        self.emit(event);
        self.dispatch();
    }

    /// Repeat-one: reload the identical track from the start.
    fn replay(&mut self) {
        if let Some(track) = self.store.current_track().cloned() {
            debug!(track_id = %track.id(), "Replaying current track");
            self.store.set_current_time(0.0);
            self.select_track(track);
        }
    }

    // ------------------------------------------------------------------------
    // Mounting
    // ------------------------------------------------------------------------

    /// Make sure the adapter for the current track is mounted and hand it
    /// the track.
    fn dispatch(&mut self) {
        let Some(track) = self.store.current_track().cloned() else {
            self.unmount();
            return;
        };
        let source = track.source();

        if self.mounted.as_ref().map(|m| m.source) != Some(source) {
            // Only one vendor player may be audible.
            if self.previous_source.is_some_and(|previous| previous != source) {
                if let Some(controls) = self.active_controls() {
                    controls.pause();
                }
            }
            self.unmount();
            if !self.mount(source) {
                self.previous_source = Some(source);
                let error = PlaybackError::SdkUnavailable { platform: source };
                if self.cascade.is_empty() {
                    self.handle_track_error(error.user_message(), error.is_auto_skippable());
                } else {
                    self.try_next_candidate(&error);
                }
                return;
            }
        }
        self.previous_source = Some(source);

        let request = LoadRequest {
            track: track.playable,
            generation: self.generation,
            autoplay: self.autoplay,
        };
        if let Some(mounted) = &self.mounted {
            mounted.loads.send_replace(Some(request));
        }
    }

    fn mount(&mut self, source: TrackSource) -> bool {
        let Some(adapter) = self.adapters.get(&source).cloned() else {
            warn!(%source, "No adapter registered");
            return false;
        };

        self.next_mount_id += 1;
        let mount_id = self.next_mount_id;
        let cancel = CancellationToken::new();
        let (loads_tx, loads_rx) = watch::channel(None);
        let ctx = AdapterContext::new(
            source,
            mount_id,
            self.events_tx.clone(),
            loads_rx,
            self.view_tx.subscribe(),
            cancel.clone(),
        );
        tokio::spawn(async move { adapter.run(ctx).await });

        info!(%source, mount_id, "Adapter mounted");
        self.emit(PlaybackEvent::SourceSwitched {
            from: self.previous_source.map(|s| s.to_string()),
            to: source.to_string(),
        });
        self.mounted = Some(MountedAdapter {
            source,
            mount_id,
            cancel,
            loads: loads_tx,
            controls: None,
            ready: false,
            has_played: false,
        });
        true
    }

    fn unmount(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            debug!(source = %mounted.source, mount_id = mounted.mount_id, "Adapter unmounted");
            mounted.cancel.cancel();
        }
    }

    fn active_controls(&self) -> Option<Arc<dyn TransportControls>> {
        self.mounted.as_ref().and_then(|m| m.controls.clone())
    }

    // ------------------------------------------------------------------------
    // Adapter events
    // ------------------------------------------------------------------------

    #[instrument(skip_all, fields(source = %event.source, mount_id = event.mount_id))]
    fn on_adapter_event(&mut self, event: SourcedEvent) {
        let Some(mounted) = self
            .mounted
            .as_mut()
            .filter(|m| m.mount_id == event.mount_id)
        else {
            debug!(event = ?event.event, "Dropping event from stale mount");
            return;
        };

        match event.event {
            AdapterEvent::Ready(ready) => mounted.ready = ready,
            AdapterEvent::ControlsRegistered(controls) => mounted.controls = Some(controls),
            AdapterEvent::Playing => {
                mounted.has_played = true;
                self.cascade.clear();
                self.set_playing(true);
            }
            AdapterEvent::Paused => self.set_playing(false),
            AdapterEvent::Ended => {
                if let Some(track) = self.store.current_track() {
                    let track_id = track.id().to_string();
                    self.emit(PlaybackEvent::TrackEnded { track_id });
                }
                self.next_track();
            }
            AdapterEvent::Progress { position, duration } => {
                if let Some(position) = position {
                    self.store.set_current_time(position);
                }
                if let Some(duration) = duration {
                    self.store.set_duration(duration);
                }
                if let Some(track) = self.store.current_track() {
                    let event = PlaybackEvent::PositionChanged {
                        track_id: track.id().to_string(),
                        position_ms: (self.store.current_time() * 1000.0) as u64,
                        duration_ms: (self.store.duration() * 1000.0) as u64,
                    };
                    self.emit(event);
                }
            }
            AdapterEvent::Seekable(seekable) => self.store.set_seekable(seekable),
            AdapterEvent::Error(error) => {
                let has_played = mounted.has_played;
                if !has_played && !self.cascade.is_empty() {
                    self.try_next_candidate(&error);
                } else {
                    self.handle_track_error(error.user_message(), error.is_auto_skippable());
                }
            }
            AdapterEvent::Resolved(resolution) => self.on_resolved(resolution),
            AdapterEvent::Unresolvable {
                error,
                external_url,
            } => self.on_unresolvable(error, external_url),
        }
        self.publish();
    }

    fn set_playing(&mut self, playing: bool) {
        if self.store.is_playing() == playing {
            return;
        }
        self.store.set_is_playing(playing);
        if let Some(track) = self.store.current_track() {
            let track_id = track.id().to_string();
            self.emit(PlaybackEvent::PlayStateChanged {
                track_id,
                is_playing: playing,
            });
        }
    }

    /// Rewrite the current track to the resolved platform and re-dispatch.
    fn on_resolved(&mut self, resolution: Resolution) {
        let mut links = resolution.candidates.iter().cloned();
        let Some(best) = links.next() else {
            warn!("Resolution without candidates");
            return;
        };
        self.cascade = links.collect();
        self.rewrite_current(&best, Some(&resolution));
    }

    /// The resolved player failed before playing anything; try the next
    /// platform the link resolved to.
    fn try_next_candidate(&mut self, error: &PlaybackError) {
        let Some(next) = self.cascade.pop_front() else {
            return;
        };
        info!(error = %error, next = %next.platform, "Resolved player failed, cascading");
        self.rewrite_current(&next, None);
    }

    fn rewrite_current(&mut self, link: &ResolvedLink, resolution: Option<&Resolution>) {
        let Some(mut track) = self.store.current_track().cloned() else {
            return;
        };
        let from = track.source();
        let to = TrackSource::from(link.platform);

        let playable = &mut track.playable;
        if playable.original_source.is_none() {
            playable.original_source = Some(from);
        }
        playable.source = to;
        playable.source_id = link.platform_id.clone();
        playable.url = Some(link.url.clone());
        if let Some(resolution) = resolution {
            if let Some(title) = resolution.title.clone() {
                playable.title = title;
            }
            if let Some(artist) = resolution.artist.clone() {
                playable.artist = artist;
            }
            if let Some(thumbnail) = resolution.thumbnail.clone() {
                playable.thumbnail = Some(thumbnail);
            }
        }

        let event = PlaybackEvent::TrackResolved {
            track_id: track.id().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            platform_id: link.platform_id.clone(),
        };
        info!(track_id = %track.id(), %from, %to, "Track rewritten to resolved platform");

        self.autoplay = allows_autoplay(to, self.store.active_feed().is_some());
        self.store.set_is_playing(self.autoplay);
        self.store.set_current_track(Some(track));
        self.emit(event);
        self.dispatch();
    }

    fn on_unresolvable(&mut self, error: PlaybackError, external_url: String) {
        let message = error.user_message();
        if let Some(track) = self.store.current_track() {
            let event = PlaybackEvent::ResolutionFailed {
                track_id: track.id().to_string(),
                message: message.clone(),
                external_url: Some(external_url.clone()),
            };
            self.emit(event);
        }
        self.store.set_player_error(Some(message));
        self.set_playing(false);
        self.external_url = Some(external_url);
    }

    // ------------------------------------------------------------------------
    // Timers and publishing
    // ------------------------------------------------------------------------

    fn fire_pending_skip(&mut self) {
        let Some(skip) = self.pending_skip.take() else {
            return;
        };
        let still_current = self.store.current_track().map(Track::id) == Some(skip.track_id.as_str());
        if !still_current {
            debug!(track_id = %skip.track_id, "Dropping auto-skip for a track no longer current");
            return;
        }
        debug!(track_id = %skip.track_id, "Auto-skipping failed track");
        self.store.set_player_error(None);
        self.emit(PlaybackEvent::ErrorCleared);
        self.next_track();
        self.publish();
    }

    fn publish(&self) {
        let ready = self.mounted.as_ref().is_some_and(|m| m.ready);
        self.view_tx
            .send_replace(self.store.view(ready, self.external_url.clone()));
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}
