//! SoundCloud widget adapter.
//!
//! Feed data carries SoundCloud tracks in three shapes: full URLs,
//! `artist/track` paths and opaque short codes. Short codes go through the
//! oEmbed endpoint to find the canonical URL the widget can load.
//!
//! The widget fires spurious `ERROR`s while a load is in flight, so errors
//! are ignored until the load completes; a watchdog reports loads that
//! never complete.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::players::{SoundCloudWidget, SoundCloudWidgetApi, SoundCloudWidgetEvent};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::adapter::{
    next_command, sleep_until_opt, take_queued_pause, wait_until_available, AdapterCommand,
    AdapterContext, AdapterEvent, PlatformAdapter,
};
use crate::config::PlaybackTimings;
use crate::error::PlaybackError;
use crate::types::TrackSource;

pub const SOUNDCLOUD_OEMBED_URL: &str = "https://soundcloud.com/oembed";
const OEMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// The three identifier shapes found in feed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundCloudId {
    Url(String),
    /// `artist/track`
    Path(String),
    ShortCode(String),
}

impl SoundCloudId {
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("http") {
            SoundCloudId::Url(input.to_string())
        } else if input.contains('/') {
            SoundCloudId::Path(input.trim_start_matches('/').to_string())
        } else {
            SoundCloudId::ShortCode(input.to_string())
        }
    }

    /// URL before any oEmbed lookup.
    pub fn direct_url(&self) -> String {
        match self {
            SoundCloudId::Url(url) => url.clone(),
            SoundCloudId::Path(path) => format!("https://soundcloud.com/{}", path),
            SoundCloudId::ShortCode(code) => format!("https://on.soundcloud.com/{}", code),
        }
    }
}

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    html: String,
}

/// Turns any [`SoundCloudId`] into a URL the widget accepts.
pub struct SoundCloudUrlResolver {
    http: Arc<dyn HttpClient>,
    oembed_url: String,
}

impl SoundCloudUrlResolver {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            oembed_url: SOUNDCLOUD_OEMBED_URL.to_string(),
        }
    }

    pub fn with_oembed_url(mut self, oembed_url: impl Into<String>) -> Self {
        self.oembed_url = oembed_url.into();
        self
    }

    /// Widget URL for `source_id`. Short-code lookups that fail fall back
    /// to the short URL itself.
    pub async fn widget_url(&self, source_id: &str) -> String {
        let id = SoundCloudId::classify(source_id);
        let direct = id.direct_url();
        if !matches!(id, SoundCloudId::ShortCode(_)) {
            return direct;
        }

        match self.lookup(&direct).await {
            Some(url) => url,
            None => {
                debug!(short_url = %direct, "oEmbed lookup failed, using short URL");
                direct
            }
        }
    }

    async fn lookup(&self, short_url: &str) -> Option<String> {
        let request = HttpRequest::get(format!(
            "{}?format=json&url={}",
            self.oembed_url,
            urlencoding::encode(short_url)
        ))
        .timeout(OEMBED_TIMEOUT);

        let response = self.http.execute(request).await.ok()?;
        if !response.is_success() {
            return None;
        }
        let body: OEmbedResponse = response.json().ok()?;
        extract_widget_url(&body.html)
    }
}

/// Pull the `url` query parameter out of the iframe `src` in oEmbed HTML.
pub fn extract_widget_url(html: &str) -> Option<String> {
    let start = html.find("src=\"")? + "src=\"".len();
    let end = start + html[start..].find('"')?;
    let src = html[start..end].replace("&amp;", "&");
    let src = Url::parse(&src).ok()?;
    src.query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|url| !url.is_empty())
}

pub struct SoundCloudAdapter {
    api: Arc<dyn SoundCloudWidgetApi>,
    urls: SoundCloudUrlResolver,
    timings: PlaybackTimings,
}

impl SoundCloudAdapter {
    pub fn new(
        api: Arc<dyn SoundCloudWidgetApi>,
        urls: SoundCloudUrlResolver,
        timings: PlaybackTimings,
    ) -> Self {
        Self { api, urls, timings }
    }
}

#[async_trait]
impl PlatformAdapter for SoundCloudAdapter {
    fn source(&self) -> TrackSource {
        TrackSource::Soundcloud
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

        // The iframe needs a src up front; point it at whatever is current.
        let initial = ctx.loads.borrow().clone().filter(|r| r.track.source == TrackSource::Soundcloud);
        let initial_url = match initial {
            Some(request) => self.urls.widget_url(&request.track.source_id).await,
            None => String::new(),
        };

        let (sdk_tx, mut sdk_events) = mpsc::unbounded_channel();
        let widget = match self.api.create_widget(&initial_url, sdk_tx).await {
            Ok(widget) => widget,
            Err(e) => {
                warn!(error = %e, "Could not bind SoundCloud widget");
                ctx.report_error(PlaybackError::PlayerInit {
                    platform: TrackSource::Soundcloud,
                    message: e.to_string(),
                });
                ctx.cancel.cancelled().await;
                return;
            }
        };

        let mut session = Session {
            widget,
            urls: &self.urls,
            load_timeout: self.timings.soundcloud_load_timeout,
            ready: false,
            loaded: None,
            load_deadline: None,
            commands: None,
        };

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                Some(event) = sdk_events.recv() => session.on_widget_event(&mut ctx, event).await,
                changed = ctx.loads.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if session.ready {
                        session.load_pending(&mut ctx).await;
                    }
                }
                Some(command) = next_command(&mut session.commands) => {
                    session.on_command(command).await;
                }
                _ = sleep_until_opt(session.load_deadline) => {
                    session.load_deadline = None;
                    warn!("SoundCloud load watchdog fired");
                    ctx.report_error(PlaybackError::SoundCloudLoadTimeout);
                }
            }
        }

        if take_queued_pause(&mut session.commands) {
            session.on_command(AdapterCommand::Pause).await;
        }
        if let Err(e) = session.widget.unbind().await {
            warn!(error = %e, "SoundCloud widget unbind failed");
        }
        debug!("SoundCloud adapter torn down");
    }
}

struct Session<'a> {
    widget: Box<dyn SoundCloudWidget>,
    urls: &'a SoundCloudUrlResolver,
    load_timeout: Duration,
    ready: bool,
    loaded: Option<(String, u64)>,
    /// Set while a load is in flight.
    load_deadline: Option<Instant>,
    commands: Option<mpsc::UnboundedReceiver<AdapterCommand>>,
}

impl Session<'_> {
    async fn on_widget_event(&mut self, ctx: &mut AdapterContext, event: SoundCloudWidgetEvent) {
        match event {
            SoundCloudWidgetEvent::Ready => {
                if !self.ready {
                    info!("SoundCloud widget ready");
                    self.ready = true;
                    ctx.ready(true);
                    self.commands = Some(ctx.register_controls());
                    ctx.emit(AdapterEvent::Seekable(true));
                }
                self.load_pending(ctx).await;
            }
            SoundCloudWidgetEvent::LoadComplete => {
                self.load_deadline = None;
                match self.widget.duration_ms().await {
                    Ok(duration_ms) => ctx.emit(AdapterEvent::Progress {
                        position: None,
                        duration: Some(duration_ms / 1000.0),
                    }),
                    Err(e) => debug!(error = %e, "SoundCloud duration unavailable"),
                }
            }
            SoundCloudWidgetEvent::Play => ctx.emit(AdapterEvent::Playing),
            SoundCloudWidgetEvent::Pause => ctx.emit(AdapterEvent::Paused),
            SoundCloudWidgetEvent::Finish => ctx.emit(AdapterEvent::Ended),
            SoundCloudWidgetEvent::Error => {
                if self.load_deadline.is_some() {
                    debug!("SoundCloud ERROR while loading, ignoring");
                } else {
                    warn!("SoundCloud playback error");
                    ctx.report_error(PlaybackError::SoundCloudUnavailable);
                }
            }
            SoundCloudWidgetEvent::PlayProgress { position_ms } => ctx.emit(AdapterEvent::Progress {
                position: Some(position_ms / 1000.0),
                duration: None,
            }),
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

        let url = self.urls.widget_url(&request.track.source_id).await;
        self.loaded = Some(key);
        self.load_deadline = Some(Instant::now() + self.load_timeout);

        match self.widget.load(&url, request.autoplay).await {
            Ok(()) => info!(url = %url, autoplay = request.autoplay, "SoundCloud load requested"),
            Err(e) => {
                self.load_deadline = None;
                ctx.report_error(PlaybackError::PlayerCall {
                    platform: TrackSource::Soundcloud,
                    message: e.to_string(),
                });
            }
        }
    }

    async fn on_command(&mut self, command: AdapterCommand) {
        let result = match command {
            AdapterCommand::Toggle => match self.widget.is_paused().await {
                Ok(true) => self.widget.play().await,
                Ok(false) => self.widget.pause().await,
                Err(e) => Err(e),
            },
            AdapterCommand::Seek(seconds) => self.widget.seek_to((seconds.max(0.0) * 1000.0).floor()).await,
            AdapterCommand::Pause => self.widget.pause().await,
        };
        if let Err(e) = result {
            warn!(?command, error = %e, "SoundCloud command failed");
        }
    }
}
