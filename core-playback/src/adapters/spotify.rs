//! Spotify adapter.
//!
//! The Web Playback SDK turns this app into a Connect device; which track
//! plays on it is decided through the Connect REST API with the user's
//! bearer token. There is no "ended" event, so a paused state within the
//! end margin of the duration counts as finished, once per load.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::players::{
    SpotifyPlaybackState, SpotifySdkEvent, SpotifyWebPlaybackSdk, SpotifyWebPlayer,
};
use core_auth::AccessTokenProvider;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::adapter::{
    next_command, take_queued_pause, wait_until_available, AdapterCommand, AdapterContext,
    AdapterEvent, PlatformAdapter,
};
use crate::config::PlaybackTimings;
use crate::error::{PlaybackError, Result};
use crate::types::TrackSource;

pub const PLAYER_NAME: &str = "Multi-Source Player";
const INITIAL_VOLUME: f32 = 0.5;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Identifiers
// ============================================================================

/// Something playable on Spotify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyItem {
    Track(String),
    Album(String),
    Playlist(String),
}

impl SpotifyItem {
    /// Accepts `open.spotify.com/{track|album|playlist}/{id}` links,
    /// `spotify:{type}:{id}` URIs and bare ids (taken as tracks).
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("spotify:") {
            let mut parts = rest.splitn(2, ':');
            return Self::from_parts(parts.next()?, parts.next()?);
        }

        if let Ok(url) = Url::parse(input) {
            if !url.host_str()?.contains("spotify.com") {
                return None;
            }
            let segments: Vec<&str> = url.path_segments()?.collect();
            return segments
                .windows(2)
                .find_map(|pair| Self::from_parts(pair[0], pair[1]));
        }

        Self::from_parts("track", input)
    }

    fn from_parts(kind: &str, id: &str) -> Option<Self> {
        let id: String = id.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
        if id.is_empty() {
            return None;
        }
        match kind {
            "track" => Some(SpotifyItem::Track(id)),
            "album" => Some(SpotifyItem::Album(id)),
            "playlist" => Some(SpotifyItem::Playlist(id)),
            _ => None,
        }
    }

    pub fn uri(&self) -> String {
        match self {
            SpotifyItem::Track(id) => format!("spotify:track:{}", id),
            SpotifyItem::Album(id) => format!("spotify:album:{}", id),
            SpotifyItem::Playlist(id) => format!("spotify:playlist:{}", id),
        }
    }

    /// Body for `PUT /me/player/play`.
    pub fn play_body(&self) -> serde_json::Value {
        match self {
            SpotifyItem::Track(_) => json!({ "uris": [self.uri()] }),
            _ => json!({ "context_uri": self.uri() }),
        }
    }
}

// ============================================================================
// Connect REST client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpotifyDevice {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(rename = "type", default)]
    pub device_type: String,
}

#[derive(Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<SpotifyDevice>,
}

/// Token-authorized calls to `/me/player`.
#[derive(Clone)]
pub struct SpotifyConnectClient {
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    api_base_url: String,
}

impl SpotifyConnectClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenProvider>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        Ok(self.tokens.access_token().await?)
    }

    #[instrument(skip(self))]
    pub async fn play(&self, item: &SpotifyItem, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("play", device_id, None);
        let request = HttpRequest::new(HttpMethod::Put, url)
            .json(&item.play_body())
            .map_err(|e| PlaybackError::SpotifyTransport(e.to_string()))?;
        self.send(request).await.map(|_| ())
    }

    pub async fn pause(&self, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("pause", device_id, None);
        self.send(HttpRequest::new(HttpMethod::Put, url)).await.map(|_| ())
    }

    pub async fn seek(&self, position_ms: u64, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("seek", device_id, Some(position_ms));
        self.send(HttpRequest::new(HttpMethod::Put, url)).await.map(|_| ())
    }

    pub async fn devices(&self) -> Result<Vec<SpotifyDevice>> {
        let url = self.endpoint("devices", None, None);
        let response = self.send(HttpRequest::get(url)).await?;
        response
            .json::<DevicesResponse>()
            .map(|body| body.devices)
            .map_err(|e| PlaybackError::SpotifyTransport(e.to_string()))
    }

    /// Poll the device list until `device_id` shows up, or any active
    /// device when there is no id. False once `attempts` polls came back
    /// empty-handed.
    pub async fn wait_for_device(
        &self,
        device_id: Option<&str>,
        attempts: u32,
        interval: Duration,
    ) -> Result<bool> {
        for attempt in 1..=attempts {
            let found = self.devices().await?.iter().any(|device| match device_id {
                Some(id) => device.id.as_deref() == Some(id),
                None => device.is_active,
            });
            if found {
                debug!(attempt, "Spotify device available");
                return Ok(true);
            }
            debug!(attempt, attempts, "No Spotify device yet");
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(false)
    }

    fn endpoint(&self, action: &str, device_id: Option<&str>, position_ms: Option<u64>) -> String {
        let mut url = format!("{}/me/player/{}", self.api_base_url, action);
        let mut query = Vec::new();
        if let Some(position_ms) = position_ms {
            query.push(format!("position_ms={}", position_ms));
        }
        if let Some(device_id) = device_id {
            query.push(format!("device_id={}", urlencoding::encode(device_id)));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.access_token().await?;
        let request = request.bearer_token(token).timeout(REQUEST_TIMEOUT);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| PlaybackError::SpotifyTransport(e.to_string()))?;
        check_status(response)
    }
}

/// Map Connect status codes onto the player error surface.
fn check_status(response: HttpResponse) -> Result<HttpResponse> {
    match response.status {
        _ if response.is_success() => Ok(response),
        401 => Err(PlaybackError::SpotifyAuthenticationFailed),
        403 => {
            let premium = response
                .text()
                .map(|body| body.contains("PREMIUM_REQUIRED"))
                .unwrap_or(false);
            if premium {
                Err(PlaybackError::SpotifyPremiumRequired)
            } else {
                Err(PlaybackError::SpotifyRest(403))
            }
        }
        404 => Err(PlaybackError::SpotifyNoActiveDevice),
        status => Err(PlaybackError::SpotifyRest(status)),
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct SpotifyAdapter {
    sdk: Arc<dyn SpotifyWebPlaybackSdk>,
    connect: Option<SpotifyConnectClient>,
    timings: PlaybackTimings,
}

impl SpotifyAdapter {
    /// `connect` is `None` when Spotify login is not configured; every load
    /// then reports that a login is required.
    pub fn new(
        sdk: Arc<dyn SpotifyWebPlaybackSdk>,
        connect: Option<SpotifyConnectClient>,
        timings: PlaybackTimings,
    ) -> Self {
        Self {
            sdk,
            connect,
            timings,
        }
    }
}

#[async_trait]
impl PlatformAdapter for SpotifyAdapter {
    fn source(&self) -> TrackSource {
        TrackSource::Spotify
    }

    #[instrument(skip_all, fields(mount_id = ctx.mount_id))]
    async fn run(&self, mut ctx: AdapterContext) {
        ctx.ready(false);

        let Some(connect) = &self.connect else {
            ctx.report_error(PlaybackError::SpotifyLoginRequired);
            ctx.cancel.cancelled().await;
            return;
        };

        let token = match connect.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "No usable Spotify token");
                ctx.report_error(e);
                ctx.cancel.cancelled().await;
                return;
            }
        };

        let sdk = self.sdk.clone();
        if !wait_until_available(&ctx.cancel, self.timings.sdk_poll_interval, || {
            sdk.is_available()
        })
        .await
        {
            return;
        }

        let (sdk_tx, mut sdk_events) = mpsc::unbounded_channel();
        let player = match self
            .sdk
            .create_player(PLAYER_NAME, token, INITIAL_VOLUME, sdk_tx)
            .await
        {
            Ok(player) => player,
            Err(e) => {
                warn!(error = %e, "Could not create Spotify player");
                ctx.report_error(PlaybackError::SpotifyInitializationFailed);
                ctx.cancel.cancelled().await;
                return;
            }
        };

        let mut session = Session {
            player,
            connect,
            end_margin_ms: self.timings.spotify_end_margin.as_millis() as u64,
            device_poll_interval: self.timings.spotify_device_poll_interval,
            device_poll_attempts: self.timings.spotify_device_poll_attempts,
            device_id: None,
            loaded: None,
            loaded_uri: None,
            deferred: None,
            end_reported: false,
            commands: None,
        };

        match session.player.connect().await {
            Ok(true) => debug!("Spotify player connecting"),
            Ok(false) | Err(_) => {
                warn!("Spotify SDK refused to connect");
                ctx.report_error(PlaybackError::SpotifyInitializationFailed);
            }
        }

        let mut state_poll = tokio::time::interval(self.timings.spotify_poll_interval);
        state_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                Some(event) = sdk_events.recv() => session.on_sdk_event(&mut ctx, event).await,
                changed = ctx.loads.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if session.device_id.is_some() {
                        session.load_pending(&mut ctx).await;
                    }
                }
                Some(command) = next_command(&mut session.commands) => {
                    session.on_command(&ctx, command).await;
                }
                _ = state_poll.tick(), if session.device_id.is_some() && session.loaded.is_some() => {
                    match session.player.current_state().await {
                        Ok(state) => session.on_state(&ctx, state),
                        Err(e) => debug!(error = %e, "Spotify state poll failed"),
                    }
                }
            }
        }

        if take_queued_pause(&mut session.commands) {
            session.on_command(&ctx, AdapterCommand::Pause).await;
        }
        if let Err(e) = session.player.disconnect().await {
            warn!(error = %e, "Spotify player disconnect failed");
        }
        debug!("Spotify adapter torn down");
    }
}

struct Session<'a> {
    player: Box<dyn SpotifyWebPlayer>,
    connect: &'a SpotifyConnectClient,
    end_margin_ms: u64,
    device_poll_interval: Duration,
    device_poll_attempts: u32,
    device_id: Option<String>,
    loaded: Option<(String, u64)>,
    loaded_uri: Option<String>,
    /// Loaded with autoplay off; started by the first toggle.
    deferred: Option<SpotifyItem>,
    end_reported: bool,
    commands: Option<mpsc::UnboundedReceiver<AdapterCommand>>,
}

impl Session<'_> {
    async fn on_sdk_event(&mut self, ctx: &mut AdapterContext, event: SpotifySdkEvent) {
        match event {
            SpotifySdkEvent::Ready { device_id } => {
                info!(device_id = %device_id, "Spotify device ready");
                let first = self.device_id.is_none() && self.commands.is_none();
                self.device_id = Some(device_id);
                ctx.ready(true);
                if first {
                    self.commands = Some(ctx.register_controls());
                }
                ctx.emit(AdapterEvent::Seekable(true));
                self.load_pending(ctx).await;
            }
            SpotifySdkEvent::NotReady { device_id } => {
                warn!(device_id = %device_id, "Spotify device went offline");
                self.device_id = None;
                ctx.ready(false);
            }
            SpotifySdkEvent::InitializationError(message) => {
                warn!(%message, "Spotify initialization error");
                ctx.report_error(PlaybackError::SpotifyInitializationFailed);
            }
            SpotifySdkEvent::AuthenticationError(message) => {
                warn!(%message, "Spotify authentication error");
                ctx.report_error(PlaybackError::SpotifyAuthenticationFailed);
            }
            SpotifySdkEvent::AccountError(message) => {
                warn!(%message, "Spotify account error");
                ctx.report_error(PlaybackError::SpotifyPremiumRequired);
            }
            SpotifySdkEvent::PlaybackError(message) => {
                warn!(%message, "Spotify playback error");
                ctx.report_error(PlaybackError::SpotifyPlaybackFailed);
            }
            SpotifySdkEvent::PlayerStateChanged(state) => self.on_state(ctx, state),
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

        let Some(item) = SpotifyItem::parse(&request.track.source_id) else {
            ctx.report_error(PlaybackError::PlayerCall {
                platform: TrackSource::Spotify,
                message: format!("unrecognized Spotify id '{}'", request.track.source_id),
            });
            return;
        };

        self.loaded = Some(key);
        self.loaded_uri = Some(item.uri());
        self.end_reported = false;

        if request.autoplay {
            self.deferred = None;
            self.start(ctx, item).await;
        } else {
            debug!(uri = %item.uri(), "Spotify load deferred until play");
            // Whatever was on the device belongs to the previous track.
            if let Err(e) = self.player.pause().await {
                debug!(error = %e, "Pause before deferred load failed");
            }
            self.deferred = Some(item);
        }
    }

    async fn start(&mut self, ctx: &AdapterContext, item: SpotifyItem) {
        let device_id = self.device_id.clone();
        let mut result = self.connect.play(&item, device_id.as_deref()).await;

        // A fresh SDK device can take a few seconds to register with Connect.
        if matches!(result, Err(PlaybackError::SpotifyNoActiveDevice)) {
            info!("No active Spotify device, waiting for it to register");
            let waited = tokio::select! {
                _ = ctx.cancel.cancelled() => return,
                waited = self.connect.wait_for_device(
                    device_id.as_deref(),
                    self.device_poll_attempts,
                    self.device_poll_interval,
                ) => waited,
            };
            result = match waited {
                Ok(true) => self.connect.play(&item, device_id.as_deref()).await,
                Ok(false) => Err(PlaybackError::SpotifyNoActiveDevice),
                Err(e) => Err(e),
            };
        }

        match result {
            Ok(()) => info!(uri = %item.uri(), "Spotify playback started"),
            Err(e) => {
                warn!(error = ?e, "Spotify play request failed");
                ctx.report_error(e);
            }
        }
    }

    async fn on_command(&mut self, ctx: &AdapterContext, command: AdapterCommand) {
        match command {
            AdapterCommand::Toggle => {
                if let Some(item) = self.deferred.take() {
                    self.start(ctx, item).await;
                } else if ctx.is_playing() {
                    self.pause().await;
                } else if let Err(e) = self.player.resume().await {
                    warn!(error = %e, "Spotify resume failed");
                }
            }
            AdapterCommand::Seek(seconds) => {
                let position_ms = (seconds.max(0.0) * 1000.0) as u64;
                if let Err(e) = self.player.seek(position_ms).await {
                    debug!(error = %e, "SDK seek failed, trying Connect");
                    if let Err(e) = self.connect.seek(position_ms, self.device_id.as_deref()).await {
                        warn!(error = %e, "Spotify seek failed");
                    }
                }
            }
            AdapterCommand::Pause => self.pause().await,
        }
    }

    async fn pause(&mut self) {
        if let Err(e) = self.player.pause().await {
            debug!(error = %e, "SDK pause failed, trying Connect");
            if let Err(e) = self.connect.pause(self.device_id.as_deref()).await {
                warn!(error = %e, "Spotify pause failed");
            }
        }
    }

    fn on_state(&mut self, ctx: &AdapterContext, state: Option<SpotifyPlaybackState>) {
        let Some(state) = state else {
            return;
        };
        if self.deferred.is_some() || self.loaded.is_none() {
            return;
        }
        if let (Some(reported), Some(expected)) = (&state.track_uri, &self.loaded_uri) {
            if expected.starts_with("spotify:track:") && reported != expected {
                debug!(%reported, "State for a different track, ignoring");
                return;
            }
        }

        ctx.emit(if state.paused {
            AdapterEvent::Paused
        } else {
            AdapterEvent::Playing
        });
        ctx.emit(AdapterEvent::Progress {
            position: Some(state.position_ms as f64 / 1000.0),
            duration: (state.duration_ms > 0).then(|| state.duration_ms as f64 / 1000.0),
        });

        let finished = state.paused
            && state.duration_ms > 0
            && state.position_ms + self.end_margin_ms >= state.duration_ms;
        if finished && !self.end_reported {
            self.end_reported = true;
            ctx.emit(AdapterEvent::Ended);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(
            SpotifyItem::parse("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            Some(SpotifyItem::Track("4uLU6hMCjMI75M1A2tKUQC".into()))
        );
        assert_eq!(
            SpotifyItem::parse("https://open.spotify.com/intl-de/album/1DFixLWuPkv3KT3TnV35m3"),
            Some(SpotifyItem::Album("1DFixLWuPkv3KT3TnV35m3".into()))
        );
        assert_eq!(
            SpotifyItem::parse("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"),
            Some(SpotifyItem::Playlist("37i9dQZF1DXcBWIGoYBM5M".into()))
        );
        assert_eq!(
            SpotifyItem::parse("4uLU6hMCjMI75M1A2tKUQC"),
            Some(SpotifyItem::Track("4uLU6hMCjMI75M1A2tKUQC".into()))
        );
        assert_eq!(SpotifyItem::parse("https://example.com/track/abc"), None);
        assert_eq!(SpotifyItem::parse("spotify:artist:abc"), None);
        assert_eq!(SpotifyItem::parse(""), None);
    }

    #[test]
    fn test_play_bodies() {
        let track = SpotifyItem::Track("abc".into());
        assert_eq!(track.play_body(), json!({"uris": ["spotify:track:abc"]}));
        let album = SpotifyItem::Album("xyz".into());
        assert_eq!(album.play_body(), json!({"context_uri": "spotify:album:xyz"}));
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(HttpResponse::new(204, "")).is_ok());
        assert!(check_status(HttpResponse::new(202, "")).is_ok());
        assert_eq!(
            check_status(HttpResponse::new(404, "")).unwrap_err(),
            PlaybackError::SpotifyNoActiveDevice
        );
        assert_eq!(
            check_status(HttpResponse::new(401, "")).unwrap_err(),
            PlaybackError::SpotifyAuthenticationFailed
        );
        assert_eq!(
            check_status(HttpResponse::new(
                403,
                r#"{"error":{"status":403,"reason":"PREMIUM_REQUIRED"}}"#
            ))
            .unwrap_err(),
            PlaybackError::SpotifyPremiumRequired
        );
        assert_eq!(
            check_status(HttpResponse::new(403, "{}")).unwrap_err(),
            PlaybackError::SpotifyRest(403)
        );
        assert_eq!(
            check_status(HttpResponse::new(500, "")).unwrap_err(),
            PlaybackError::SpotifyRest(500)
        );
    }
}
