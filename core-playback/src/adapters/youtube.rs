//! YouTube IFrame player adapter.
//!
//! Position and duration are polled, not pushed. A [`SeekDetector`] runs on
//! its own tick so the `PAUSED` the iframe fires during a user seek does
//! not flip the player to paused.

use async_trait::async_trait;
use bridge_traits::players::{YouTubeEvent, YouTubeIframeApi, YouTubePlayer, YouTubePlayerState};
use bridge_traits::time::Clock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{
    next_command, take_queued_pause, wait_until_available, AdapterCommand, AdapterContext,
    AdapterEvent, PlatformAdapter,
};
use crate::config::PlaybackTimings;
use crate::error::PlaybackError;
use crate::seek_detector::SeekDetector;
use crate::types::TrackSource;

pub struct YouTubeAdapter {
    api: Arc<dyn YouTubeIframeApi>,
    clock: Arc<dyn Clock>,
    timings: PlaybackTimings,
}

impl YouTubeAdapter {
    pub fn new(api: Arc<dyn YouTubeIframeApi>, clock: Arc<dyn Clock>, timings: PlaybackTimings) -> Self {
        Self { api, clock, timings }
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn source(&self) -> TrackSource {
        TrackSource::Youtube
    }

    #[instrument(skip_all, fields(mount_id = ctx.mount_id))]
    async fn run(&self, mut ctx: AdapterContext) {
        ctx.ready(false);

        let api = self.api.clone();
        if !wait_until_available(&ctx.cancel, self.timings.sdk_poll_interval, || {
            api.is_available()
        })
        .await
        {
            return;
        }

        let (sdk_tx, mut sdk_events) = mpsc::unbounded_channel();
        let player = match self.api.create_player(sdk_tx).await {
            Ok(player) => player,
            Err(e) => {
                warn!(error = %e, "Could not create YouTube player");
                ctx.report_error(PlaybackError::PlayerInit {
                    platform: TrackSource::Youtube,
                    message: e.to_string(),
                });
                ctx.cancel.cancelled().await;
                return;
            }
        };
        debug!("YouTube player created, waiting for onReady");

        let mut session = Session {
            player,
            ready: false,
            loaded: None,
            seek: SeekDetector::new(self.clock.clone(), self.timings.seek_jump_threshold),
            commands: None,
        };

        let mut position_poll = tokio::time::interval(self.timings.youtube_poll_interval);
        position_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut seek_tick = tokio::time::interval(self.timings.seek_tick_interval);
        seek_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                Some(event) = sdk_events.recv() => session.on_sdk_event(&mut ctx, event).await,
                changed = ctx.loads.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if session.ready {
                        session.load_pending(&mut ctx).await;
                    }
                }
                Some(command) = next_command(&mut session.commands) => {
                    session.on_command(&ctx, command).await;
                }
                _ = position_poll.tick(), if session.ready => session.poll_progress(&ctx).await,
                _ = seek_tick.tick(), if session.ready => session.sample_position(&ctx).await,
            }
        }

        if take_queued_pause(&mut session.commands) {
            session.on_command(&ctx, AdapterCommand::Pause).await;
        }
        if let Err(e) = session.player.destroy().await {
            warn!(error = %e, "YouTube player destroy failed");
        }
        debug!("YouTube adapter torn down");
    }
}

struct Session {
    player: Box<dyn YouTubePlayer>,
    ready: bool,
    loaded: Option<(String, u64)>,
    seek: SeekDetector,
    commands: Option<mpsc::UnboundedReceiver<AdapterCommand>>,
}

impl Session {
    async fn on_sdk_event(&mut self, ctx: &mut AdapterContext, event: YouTubeEvent) {
        match event {
            YouTubeEvent::Ready => {
                info!("YouTube player ready");
                self.ready = true;
                ctx.ready(true);
                self.commands = Some(ctx.register_controls());
                ctx.emit(AdapterEvent::Seekable(true));
                self.load_pending(ctx).await;
            }
            YouTubeEvent::StateChange(YouTubePlayerState::Playing) => {
                self.seek.mark_playing();
                ctx.emit(AdapterEvent::Playing);
            }
            YouTubeEvent::StateChange(YouTubePlayerState::Paused) => {
                if self.seek.is_seeking() {
                    debug!("PAUSED during seek, ignoring");
                } else {
                    ctx.emit(AdapterEvent::Paused);
                }
            }
            YouTubeEvent::StateChange(YouTubePlayerState::Ended) => ctx.emit(AdapterEvent::Ended),
            YouTubeEvent::StateChange(state) => debug!(?state, "YouTube state change"),
            YouTubeEvent::Error(code) => {
                warn!(code, "YouTube player error");
                ctx.report_error(PlaybackError::from_youtube_code(code));
            }
        }
    }

    async fn load_pending(&mut self, ctx: &mut AdapterContext) {
        let Some(request) = ctx.take_load() else {
            return;
        };
        let key = request.key();
        if self.loaded.as_ref() == Some(&key) {
            debug!(source_id = %key.0, "Already loaded, skipping");
            return;
        }

        let video_id = normalize_youtube_id(&request.track.source_id);
        self.seek.reset();
        let result = if request.autoplay {
            self.player.load_video_by_id(&video_id).await
        } else {
            self.player.cue_video_by_id(&video_id).await
        };

        match result {
            Ok(()) => {
                info!(video_id = %video_id, autoplay = request.autoplay, "YouTube video loaded");
                self.loaded = Some(key);
            }
            Err(e) => ctx.report_error(PlaybackError::PlayerCall {
                platform: TrackSource::Youtube,
                message: e.to_string(),
            }),
        }
    }

    async fn on_command(&mut self, ctx: &AdapterContext, command: AdapterCommand) {
        let result = match command {
            AdapterCommand::Toggle if ctx.is_playing() => self.player.pause_video().await,
            AdapterCommand::Toggle => self.player.play_video().await,
            AdapterCommand::Seek(seconds) => {
                self.seek.mark_seeking();
                self.player.seek_to(seconds, true).await
            }
            AdapterCommand::Pause => self.player.pause_video().await,
        };
        if let Err(e) = result {
            warn!(?command, error = %e, "YouTube command failed");
        }
    }

    async fn poll_progress(&mut self, ctx: &AdapterContext) {
        if !ctx.is_playing() {
            return;
        }
        match (self.player.current_time().await, self.player.duration().await) {
            (Ok(position), Ok(duration)) => ctx.emit(AdapterEvent::Progress {
                position: Some(position),
                duration: Some(duration),
            }),
            _ => debug!("YouTube progress not available yet"),
        }
    }

    async fn sample_position(&mut self, ctx: &AdapterContext) {
        if let Ok(position) = self.player.current_time().await {
            self.seek.observe(position, ctx.is_playing());
        }
    }
}

/// Extract a video id from the link shapes seen in feeds; anything else
/// (including a bare 11-character id) is used as-is.
pub fn normalize_youtube_id(input: &str) -> String {
    const MARKERS: [&str; 3] = ["youtube.com/watch?v=", "youtu.be/", "youtube.com/embed/"];

    MARKERS
        .iter()
        .filter_map(|marker| {
            let start = input.find(marker)? + marker.len();
            let id: String = input[start..]
                .chars()
                .take_while(|c| !matches!(c, '&' | '\n' | '?' | '#'))
                .collect();
            Some(id).filter(|id| !id.is_empty())
        })
        .next()
        .unwrap_or_else(|| input.to_string())
}
