//! # Player Service
//!
//! One [`PlayerService`] per playback session. It owns the pieces that
//! outlive a single coordinator run (event bus, resolver cache, Spotify
//! tokens) and hands out [`PlayerHandle`]s to the host.

use bridge_traits::players::{SoundCloudWidgetApi, SpotifyWebPlaybackSdk, YouTubeIframeApi};
use core_auth::{AccessTokenProvider, PendingTrackEnvelope, SpotifyAuthenticator};
use core_playback::adapters::{
    ResolvingAdapter, SoundCloudAdapter, SoundCloudUrlResolver, SpotifyAdapter,
    SpotifyConnectClient, YouTubeAdapter,
};
use core_playback::{
    HttpTrackCatalog, PendingTrackRecovery, PlaybackCoordinator, PlaybackTimings, PlayerHandle,
};
use core_resolver::OdesliResolver;
use core_runtime::config::PlayerConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::error::{CoreError, Result};

/// Vendor player SDK bridges supplied by the host.
#[derive(Clone)]
pub struct PlayerSdks {
    pub youtube: Arc<dyn YouTubeIframeApi>,
    pub spotify: Arc<dyn SpotifyWebPlaybackSdk>,
    pub soundcloud: Arc<dyn SoundCloudWidgetApi>,
}

pub struct PlayerService {
    config: PlayerConfig,
    timings: PlaybackTimings,
    sdks: PlayerSdks,
    event_bus: EventBus,
    resolver: Arc<OdesliResolver>,
    authenticator: Option<Arc<SpotifyAuthenticator>>,
    recovery: PendingTrackRecovery,
    handle: Mutex<Option<PlayerHandle>>,
}

impl PlayerService {
    pub fn new(config: PlayerConfig, timings: PlaybackTimings, sdks: PlayerSdks) -> Result<Self> {
        config.validate()?;
        timings.validate().map_err(CoreError::InitializationFailed)?;

        let event_bus = EventBus::new(config.event_buffer_size);

        let resolver = Arc::new(
            OdesliResolver::new(
                config.api_base(),
                config.http_client.clone(),
                config.clock.clone(),
                config.resolver,
            )
            .with_event_bus(event_bus.clone()),
        );

        let authenticator = config.spotify.as_ref().map(|app| {
            Arc::new(
                SpotifyAuthenticator::new(
                    app,
                    config.http_client.clone(),
                    config.secure_store.clone(),
                    config.clock.clone(),
                )
                .with_event_bus(event_bus.clone()),
            )
        });

        let catalog = Arc::new(HttpTrackCatalog::new(
            config.http_client.clone(),
            config.api_base(),
        ));
        let recovery = PendingTrackRecovery::new(catalog, config.clock.clone());

        info!(
            api_base_url = %config.api_base(),
            spotify_login = authenticator.is_some(),
            "Player service initialized"
        );

        Ok(Self {
            config,
            timings,
            sdks,
            event_bus,
            resolver,
            authenticator,
            recovery,
            handle: Mutex::new(None),
        })
    }

    /// Spawn the coordinator on the current tokio runtime. Calling it again
    /// returns the running session's handle.
    pub fn start(&self) -> PlayerHandle {
        let mut handle = self.handle.lock();
        if let Some(running) = handle.as_ref() {
            return running.clone();
        }

        let coordinator = self
            .adapters()
            .into_iter()
            .fold(PlaybackCoordinator::new(self.timings.clone()), |c, adapter| {
                c.with_adapter(adapter)
            })
            .with_event_bus(self.event_bus.clone());

        let started = coordinator.spawn();
        debug!("Playback coordinator started");
        *handle = Some(started.clone());
        started
    }

    fn adapters(&self) -> Vec<Arc<dyn core_playback::PlatformAdapter>> {
        let http = self.config.http_client.clone();
        let connect = match (&self.authenticator, &self.config.spotify) {
            (Some(auth), Some(app)) => Some(SpotifyConnectClient::new(
                http.clone(),
                auth.clone() as Arc<dyn AccessTokenProvider>,
                app.api_base_url.clone(),
            )),
            _ => None,
        };

        vec![
            Arc::new(YouTubeAdapter::new(
                self.sdks.youtube.clone(),
                self.config.clock.clone(),
                self.timings.clone(),
            )),
            Arc::new(SpotifyAdapter::new(
                self.sdks.spotify.clone(),
                connect,
                self.timings.clone(),
            )),
            Arc::new(SoundCloudAdapter::new(
                self.sdks.soundcloud.clone(),
                SoundCloudUrlResolver::new(http),
                self.timings.clone(),
            )),
            Arc::new(ResolvingAdapter::songlink(self.resolver.clone())),
            Arc::new(ResolvingAdapter::apple_music(self.resolver.clone())),
        ]
    }

    /// Authorize URL to redirect to. `pending` is the track to resume once
    /// the user is back.
    pub async fn begin_spotify_login(&self, pending: Option<PendingTrackEnvelope>) -> Result<String> {
        let auth = self.authenticator()?;
        Ok(auth.begin_login(pending).await?)
    }

    /// Finish the OAuth callback. Returns whether a pending track was
    /// resumed; failing to resume is not an error.
    #[instrument(skip(self, code, state))]
    pub async fn complete_spotify_login(&self, code: &str, state: &str) -> Result<bool> {
        let auth = self.authenticator()?;
        let outcome = auth.handle_callback(code, state).await?;

        let Some(envelope) = outcome.pending_track else {
            return Ok(false);
        };
        let player = self.start();
        Ok(self.recovery.restore(&envelope, &player).await)
    }

    pub async fn sign_out_spotify(&self) -> Result<()> {
        Ok(self.authenticator()?.sign_out().await?)
    }

    pub async fn is_spotify_authenticated(&self) -> bool {
        match &self.authenticator {
            Some(auth) => auth.is_authenticated().await,
            None => false,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_stream(&self) -> EventStream {
        self.event_bus.stream()
    }

    pub fn resolver(&self) -> Arc<OdesliResolver> {
        self.resolver.clone()
    }

    /// Stop the coordinator, if running. A later [`start`](Self::start)
    /// begins a fresh session.
    pub fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.shutdown();
            info!("Playback session shut down");
        }
    }

    fn authenticator(&self) -> Result<&SpotifyAuthenticator> {
        self.authenticator
            .as_deref()
            .ok_or(CoreError::SpotifyNotConfigured)
    }
}
