//! Coordinator behaviour against scripted adapters.
//!
//! Every test runs on a paused clock: `settle()` sleeps a millisecond,
//! which only returns once every spawned task is idle.

use async_trait::async_trait;
use core_playback::{
    AdapterContext, AdapterEvent, PlaybackCoordinator, PlaybackError, PlaybackTimings,
    PlatformAdapter, PlayableTrack, PlayerHandle, RepeatMode, Track, TrackSource,
    TransportControls,
};
use core_resolver::{ResolvedLink, ResolvedPlatform, Resolution, ResolverError};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load {
        source_id: String,
        generation: u64,
        autoplay: bool,
    },
    Toggle,
    Seek(f64),
    Pause,
    TornDown,
}

type Log = Arc<Mutex<Vec<(TrackSource, Call)>>>;

struct RecordingControls {
    source: TrackSource,
    log: Log,
}

impl TransportControls for RecordingControls {
    fn toggle(&self) {
        self.log.lock().push((self.source, Call::Toggle));
    }

    fn seek(&self, seconds: f64) {
        self.log.lock().push((self.source, Call::Seek(seconds)));
    }

    fn pause(&self) {
        self.log.lock().push((self.source, Call::Pause));
    }
}

/// Adapter that becomes ready at once, records what it is asked to do and
/// forwards scripted events while mounted.
struct ScriptedAdapter {
    source: TrackSource,
    log: Log,
    script: broadcast::Sender<AdapterEvent>,
}

impl ScriptedAdapter {
    fn new(source: TrackSource, log: Log) -> Arc<Self> {
        let (script, _) = broadcast::channel(16);
        Arc::new(Self { source, log, script })
    }

    fn emit(&self, event: AdapterEvent) {
        let _ = self.script.send(event);
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn source(&self) -> TrackSource {
        self.source
    }

    async fn run(&self, mut ctx: AdapterContext) {
        let mut script = self.script.subscribe();
        ctx.ready(true);
        ctx.emit(AdapterEvent::ControlsRegistered(Arc::new(RecordingControls {
            source: self.source,
            log: self.log.clone(),
        })));

        let mut loaded = None;
        loop {
            if let Some(request) = ctx.take_load() {
                if loaded.as_ref() != Some(&request.key()) {
                    loaded = Some(request.key());
                    self.log.lock().push((
                        self.source,
                        Call::Load {
                            source_id: request.track.source_id.clone(),
                            generation: request.generation,
                            autoplay: request.autoplay,
                        },
                    ));
                }
            }

            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                changed = ctx.loads.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Ok(event) = script.recv() => ctx.emit(event),
            }
        }
        self.log.lock().push((self.source, Call::TornDown));
    }
}

struct Harness {
    handle: PlayerHandle,
    log: Log,
    youtube: Arc<ScriptedAdapter>,
    spotify: Arc<ScriptedAdapter>,
    soundcloud: Arc<ScriptedAdapter>,
    songlink: Arc<ScriptedAdapter>,
    events: broadcast::Receiver<CoreEvent>,
}

impl Harness {
    fn start() -> Self {
        let log: Log = Arc::default();
        let youtube = ScriptedAdapter::new(TrackSource::Youtube, log.clone());
        let spotify = ScriptedAdapter::new(TrackSource::Spotify, log.clone());
        let soundcloud = ScriptedAdapter::new(TrackSource::Soundcloud, log.clone());
        let songlink = ScriptedAdapter::new(TrackSource::Songlink, log.clone());
        let bus = EventBus::new(256);
        let events = bus.subscribe();

        let handle = PlaybackCoordinator::new(PlaybackTimings::default())
            .with_adapter(youtube.clone())
            .with_adapter(spotify.clone())
            .with_adapter(soundcloud.clone())
            .with_adapter(songlink.clone())
            .with_event_bus(bus)
            .spawn();

        Self {
            handle,
            log,
            youtube,
            spotify,
            soundcloud,
            songlink,
            events,
        }
    }

    fn calls(&self) -> Vec<(TrackSource, Call)> {
        self.log.lock().clone()
    }

    fn clear(&self) {
        self.log.lock().clear();
    }

    fn current_id(&self) -> Option<String> {
        self.handle
            .view()
            .current_track
            .map(|track| track.id().to_string())
    }

    fn playback_events(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let CoreEvent::Playback(event) = event {
                events.push(event);
            }
        }
        events
    }

    async fn play(&self, track: &Track, feed: &[Track]) {
        self.handle
            .play_track_from_feed(track.clone(), feed.to_vec(), "feed".to_string())
            .unwrap();
        settle().await;
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn track(id: &str, source: TrackSource) -> Track {
    Track::new(PlayableTrack::new(
        id,
        source,
        format!("{}-native", id),
        format!("Title {}", id),
        "Artist",
    ))
}

/// `[A(youtube), B(spotify), C(soundcloud)]`
fn mixed_feed() -> Vec<Track> {
    vec![
        track("A", TrackSource::Youtube),
        track("B", TrackSource::Spotify),
        track("C", TrackSource::Soundcloud),
    ]
}

fn pauses(calls: &[(TrackSource, Call)], source: TrackSource) -> usize {
    calls
        .iter()
        .filter(|(s, call)| *s == source && *call == Call::Pause)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_play_track_from_feed_applies_manual_play_policy() {
    let h = Harness::start();
    let feed = mixed_feed();

    h.play(&feed[0], &feed).await;
    let view = h.handle.view();
    assert_eq!(h.current_id().as_deref(), Some("A"));
    assert!(!view.is_playing, "YouTube never autoplays");
    assert!(view.player_ready);
    assert_eq!(view.active_feed.as_deref(), Some("feed"));
    assert_eq!(view.current_index, Some(0));
    assert!(h.calls().contains(&(
        TrackSource::Youtube,
        Call::Load {
            source_id: "A-native".into(),
            generation: 0,
            autoplay: false,
        }
    )));

    h.play(&feed[2], &feed).await;
    assert!(h.handle.view().is_playing, "SoundCloud autoplays");
}

#[tokio::test(start_paused = true)]
async fn test_next_from_youtube_to_spotify_stays_paused() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;

    h.handle.next_track().unwrap();
    settle().await;

    let view = h.handle.view();
    assert_eq!(h.current_id().as_deref(), Some("B"));
    assert!(!view.is_playing, "Spotify inside a feed waits for the user");
    assert!(h.calls().contains(&(
        TrackSource::Spotify,
        Call::Load {
            source_id: "B-native".into(),
            generation: 0,
            autoplay: false,
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_next_at_end_without_repeat_stops() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[2], &feed).await;
    assert!(h.handle.view().is_playing);

    h.handle.next_track().unwrap();
    settle().await;

    let view = h.handle.view();
    assert_eq!(h.current_id().as_deref(), Some("C"));
    assert_eq!(view.current_index, Some(2));
    assert!(!view.is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_next_at_end_with_repeat_all_wraps() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.handle.set_repeat_mode(RepeatMode::All).unwrap();
    h.play(&feed[2], &feed).await;

    h.handle.next_track().unwrap();
    settle().await;

    assert_eq!(h.current_id().as_deref(), Some("A"));
    assert_eq!(h.handle.view().current_index, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_repeat_one_reloads_same_track() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.handle.set_repeat_mode(RepeatMode::One).unwrap();
    h.play(&feed[2], &feed).await;
    h.soundcloud.emit(AdapterEvent::Progress {
        position: Some(180.0),
        duration: Some(200.0),
    });
    settle().await;
    assert_eq!(h.handle.view().current_time, 180.0);

    h.handle.next_track().unwrap();
    settle().await;

    assert_eq!(h.current_id().as_deref(), Some("C"));
    assert_eq!(h.handle.view().current_time, 0.0, "replay starts from the top");
    let loads: Vec<u64> = h
        .calls()
        .into_iter()
        .filter_map(|(_, call)| match call {
            Call::Load {
                source_id,
                generation,
                ..
            } if source_id == "C-native" => Some(generation),
            _ => None,
        })
        .collect();
    assert_eq!(loads, vec![0, 1], "same id reloaded under a new generation");
}

#[tokio::test(start_paused = true)]
async fn test_previous_at_start_is_noop() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[1], &feed).await;

    h.handle.previous_track().unwrap();
    settle().await;
    assert_eq!(h.current_id().as_deref(), Some("A"));

    h.handle.previous_track().unwrap();
    settle().await;
    assert_eq!(h.current_id().as_deref(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn test_pause_is_called_exactly_once_per_source_change() {
    let h = Harness::start();
    let feed = vec![
        track("A", TrackSource::Youtube),
        track("A2", TrackSource::Youtube),
        track("B", TrackSource::Spotify),
        track("C", TrackSource::Soundcloud),
    ];

    h.play(&feed[0], &feed).await;
    h.play(&feed[1], &feed).await;
    assert_eq!(pauses(&h.calls(), TrackSource::Youtube), 0, "same source, no pause");

    h.play(&feed[2], &feed).await;
    let calls = h.calls();
    assert_eq!(pauses(&calls, TrackSource::Youtube), 1);
    let paused_at = calls
        .iter()
        .position(|c| *c == (TrackSource::Youtube, Call::Pause))
        .unwrap();
    let spotify_load = calls
        .iter()
        .position(|(s, call)| *s == TrackSource::Spotify && matches!(call, Call::Load { .. }))
        .unwrap();
    assert!(paused_at < spotify_load, "pause before the new source loads");
    assert!(calls.contains(&(TrackSource::Youtube, Call::TornDown)));

    h.play(&feed[3], &feed).await;
    let calls = h.calls();
    assert_eq!(pauses(&calls, TrackSource::Spotify), 1);
    assert_eq!(pauses(&calls, TrackSource::Youtube), 1);
}

#[tokio::test(start_paused = true)]
async fn test_controls_go_to_active_adapter() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;
    h.clear();

    h.handle.toggle_play().unwrap();
    h.handle.seek(42.0).unwrap();
    settle().await;

    assert_eq!(
        h.calls(),
        vec![
            (TrackSource::Youtube, Call::Toggle),
            (TrackSource::Youtube, Call::Seek(42.0)),
        ]
    );
    assert_eq!(h.handle.view().current_time, 42.0);
}

#[tokio::test(start_paused = true)]
async fn test_adapter_events_drive_transport_state() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;

    h.youtube.emit(AdapterEvent::Playing);
    h.youtube.emit(AdapterEvent::Seekable(true));
    h.youtube.emit(AdapterEvent::Progress {
        position: Some(12.5),
        duration: Some(200.0),
    });
    settle().await;

    let view = h.handle.view();
    assert!(view.is_playing);
    assert!(view.is_seekable);
    assert_eq!(view.current_time, 12.5);
    assert_eq!(view.duration, 200.0);

    h.youtube.emit(AdapterEvent::Paused);
    settle().await;
    assert!(!h.handle.view().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_ended_advances_to_next_track() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[1], &feed).await;

    h.spotify.emit(AdapterEvent::Ended);
    settle().await;

    assert_eq!(h.current_id().as_deref(), Some("C"));
    assert!(h.handle.view().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_torn_down_adapter_cannot_write_state() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;
    h.play(&feed[2], &feed).await;
    h.soundcloud.emit(AdapterEvent::Paused);
    settle().await;
    assert!(!h.handle.view().is_playing);

    h.youtube.emit(AdapterEvent::Playing);
    h.youtube.emit(AdapterEvent::Progress {
        position: Some(99.0),
        duration: Some(100.0),
    });
    settle().await;

    let view = h.handle.view();
    assert!(!view.is_playing);
    assert_eq!(view.current_time, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_auto_skip_after_delay() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;

    h.youtube
        .emit(AdapterEvent::Error(PlaybackError::YouTubeUnavailable(150)));
    settle().await;
    let view = h.handle.view();
    assert_eq!(
        view.error.as_deref(),
        Some("YouTube video unavailable (error 150). Skipping...")
    );
    assert_eq!(h.current_id().as_deref(), Some("A"));

    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert_eq!(h.current_id().as_deref(), Some("A"), "not before the delay");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.current_id().as_deref(), Some("B"));
    assert_eq!(h.handle.view().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_account_errors_do_not_skip() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[1], &feed).await;

    h.spotify
        .emit(AdapterEvent::Error(PlaybackError::SpotifyPremiumRequired));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.current_id().as_deref(), Some("B"));
    assert_eq!(
        h.handle.view().error.as_deref(),
        Some("Spotify Premium required")
    );
}

#[tokio::test(start_paused = true)]
async fn test_auto_skip_does_not_advance_after_user_moved_on() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;

    h.handle.handle_track_error("boom", true).unwrap();
    settle().await;
    h.handle.next_track().unwrap();
    settle().await;
    assert_eq!(h.current_id().as_deref(), Some("B"));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.current_id().as_deref(), Some("B"));
    assert_eq!(h.handle.view().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_auto_skip_keeps_error_of_new_track() {
    let h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;

    h.handle.handle_track_error("boom", true).unwrap();
    settle().await;
    h.handle.next_track().unwrap();
    settle().await;
    assert_eq!(h.current_id().as_deref(), Some("B"));
    assert_eq!(h.handle.view().error, None, "A's error is not shown on B");

    h.handle
        .handle_track_error("Please login to Spotify first", false)
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let view = h.handle.view();
    assert_eq!(h.current_id().as_deref(), Some("B"));
    assert_eq!(view.error.as_deref(), Some("Please login to Spotify first"));
}

fn songlink_resolution() -> Resolution {
    Resolution {
        platform: Some(ResolvedPlatform::Spotify),
        platform_id: Some("7kJ4bC3KqYgBf2QzcoHjSY".into()),
        url: Some("https://open.spotify.com/track/7kJ4bC3KqYgBf2QzcoHjSY".into()),
        title: Some("Windowlicker".into()),
        artist: Some("Aphex Twin".into()),
        candidates: vec![
            ResolvedLink {
                platform: ResolvedPlatform::Spotify,
                platform_id: "7kJ4bC3KqYgBf2QzcoHjSY".into(),
                url: "https://open.spotify.com/track/7kJ4bC3KqYgBf2QzcoHjSY".into(),
            },
            ResolvedLink {
                platform: ResolvedPlatform::Soundcloud,
                platform_id: "https://soundcloud.com/aphex/windowlicker".into(),
                url: "https://soundcloud.com/aphex/windowlicker".into(),
            },
        ],
        ..Resolution::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_resolved_track_is_rewritten_and_redispatched() {
    let mut h = Harness::start();
    let feed = vec![track("S", TrackSource::Songlink)];
    h.play(&feed[0], &feed).await;
    assert!(h.calls().iter().any(|(s, call)| *s == TrackSource::Songlink
        && matches!(call, Call::Load { source_id, .. } if source_id == "S-native")));

    h.songlink.emit(AdapterEvent::Resolved(songlink_resolution()));
    settle().await;

    let current = h.handle.view().current_track.unwrap();
    assert_eq!(current.id(), "S");
    assert_eq!(current.source(), TrackSource::Spotify);
    assert_eq!(current.playable.source_id, "7kJ4bC3KqYgBf2QzcoHjSY");
    assert_eq!(current.playable.original_source, Some(TrackSource::Songlink));
    assert_eq!(current.playable.title, "Windowlicker");
    assert!(h.calls().contains(&(
        TrackSource::Spotify,
        Call::Load {
            source_id: "7kJ4bC3KqYgBf2QzcoHjSY".into(),
            generation: 0,
            autoplay: false,
        }
    )));
    assert!(h.playback_events().iter().any(|event| matches!(
        event,
        PlaybackEvent::TrackResolved { from, to, .. } if from == "songlink" && to == "spotify"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_failed_resolved_player_cascades_to_next_candidate() {
    let h = Harness::start();
    let feed = vec![track("S", TrackSource::Songlink)];
    h.play(&feed[0], &feed).await;
    h.songlink.emit(AdapterEvent::Resolved(songlink_resolution()));
    settle().await;

    h.spotify
        .emit(AdapterEvent::Error(PlaybackError::SpotifyPlaybackFailed));
    settle().await;

    let current = h.handle.view().current_track.unwrap();
    assert_eq!(current.source(), TrackSource::Soundcloud);
    assert_eq!(current.playable.original_source, Some(TrackSource::Songlink));
    assert_eq!(h.handle.view().error, None);

    // Out of candidates: the usual error path.
    h.soundcloud
        .emit(AdapterEvent::Error(PlaybackError::SoundCloudUnavailable));
    settle().await;
    assert_eq!(
        h.handle.view().error.as_deref(),
        Some("SoundCloud track unavailable. Skipping...")
    );
}

#[tokio::test(start_paused = true)]
async fn test_unmountable_resolved_player_cascades_to_next_candidate() {
    let log: Log = Arc::default();
    let soundcloud = ScriptedAdapter::new(TrackSource::Soundcloud, log.clone());
    let songlink = ScriptedAdapter::new(TrackSource::Songlink, log.clone());
    let handle = PlaybackCoordinator::new(PlaybackTimings::default())
        .with_adapter(soundcloud)
        .with_adapter(songlink.clone())
        .spawn();

    let feed = vec![track("S", TrackSource::Songlink)];
    handle
        .play_track_from_feed(feed[0].clone(), feed.clone(), "feed".into())
        .unwrap();
    settle().await;
    songlink.emit(AdapterEvent::Resolved(songlink_resolution()));
    settle().await;

    let view = handle.view();
    let current = view.current_track.unwrap();
    assert_eq!(current.source(), TrackSource::Soundcloud);
    assert_eq!(current.playable.original_source, Some(TrackSource::Songlink));
    assert_eq!(view.error, None);
    assert!(log.lock().iter().any(|(s, call)| *s == TrackSource::Soundcloud
        && matches!(call, Call::Load { source_id, .. }
            if source_id == "https://soundcloud.com/aphex/windowlicker")));
}

#[tokio::test(start_paused = true)]
async fn test_no_cascade_once_playing() {
    let h = Harness::start();
    let feed = vec![track("S", TrackSource::Songlink)];
    h.play(&feed[0], &feed).await;
    h.songlink.emit(AdapterEvent::Resolved(songlink_resolution()));
    settle().await;

    h.spotify.emit(AdapterEvent::Playing);
    h.spotify
        .emit(AdapterEvent::Error(PlaybackError::SpotifyPlaybackFailed));
    settle().await;

    let view = h.handle.view();
    assert_eq!(view.current_track.unwrap().source(), TrackSource::Spotify);
    assert_eq!(view.error.as_deref(), Some("Spotify playback failed"));
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_offers_external_link_without_skipping() {
    let mut h = Harness::start();
    let feed = vec![
        track("S", TrackSource::Songlink),
        track("C", TrackSource::Soundcloud),
    ];
    h.play(&feed[0], &feed).await;

    h.songlink.emit(AdapterEvent::Unresolvable {
        error: PlaybackError::Resolution(ResolverError::NoSupportedPlatform),
        external_url: "https://song.link/S-native".into(),
    });
    tokio::time::sleep(Duration::from_secs(5)).await;

    let view = h.handle.view();
    assert_eq!(h.current_id().as_deref(), Some("S"));
    assert_eq!(
        view.error.as_deref(),
        Some("No supported platforms found (YouTube, Spotify, or SoundCloud)")
    );
    assert_eq!(view.external_url.as_deref(), Some("https://song.link/S-native"));
    assert!(h
        .playback_events()
        .iter()
        .any(|event| matches!(event, PlaybackEvent::ResolutionFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_close_player_pauses_and_clears() {
    let mut h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[2], &feed).await;

    h.handle.close_player().unwrap();
    settle().await;

    let calls = h.calls();
    assert_eq!(pauses(&calls, TrackSource::Soundcloud), 1);
    assert!(calls.contains(&(TrackSource::Soundcloud, Call::TornDown)));
    let view = h.handle.view();
    assert!(view.current_track.is_none());
    assert!(!view.is_playing);
    assert!(!view.player_ready);
    assert!(h
        .playback_events()
        .contains(&PlaybackEvent::PlayerClosed));
}

#[tokio::test(start_paused = true)]
async fn test_source_switches_are_published() {
    let mut h = Harness::start();
    let feed = mixed_feed();
    h.play(&feed[0], &feed).await;
    h.play(&feed[1], &feed).await;

    let switches: Vec<_> = h
        .playback_events()
        .into_iter()
        .filter_map(|event| match event {
            PlaybackEvent::SourceSwitched { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        switches,
        vec![
            (None, "youtube".to_string()),
            (Some("youtube".to_string()), "spotify".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_adapter_reports_error() {
    let handle = PlaybackCoordinator::new(PlaybackTimings::default()).spawn();
    let feed = vec![track("A", TrackSource::Youtube)];
    handle
        .play_track_from_feed(feed[0].clone(), feed.clone(), "feed".into())
        .unwrap();
    settle().await;

    let view = handle.view();
    assert_eq!(view.error.as_deref(), Some("youtube player is not available"));
    assert!(!view.player_ready);
}

#[tokio::test(start_paused = true)]
async fn test_handle_reports_stopped_coordinator() {
    let handle = PlaybackCoordinator::new(PlaybackTimings::default()).spawn();
    handle.shutdown();
    settle().await;

    assert_eq!(handle.toggle_play(), Err(PlaybackError::CoordinatorStopped));
}
