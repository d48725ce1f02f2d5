//! Adapter for sources with no player of their own (song.link and Apple
//! Music). It resolves the link through Odesli and hands the result back to
//! the coordinator, which rewrites the track and re-dispatches it.

use async_trait::async_trait;
use core_resolver::{OdesliResolver, ResolverError};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{AdapterContext, AdapterEvent, PlatformAdapter};
use crate::error::PlaybackError;
use crate::types::{PlayableTrack, TrackSource};

pub struct ResolvingAdapter {
    source: TrackSource,
    resolver: Arc<OdesliResolver>,
}

impl ResolvingAdapter {
    pub fn songlink(resolver: Arc<OdesliResolver>) -> Self {
        Self {
            source: TrackSource::Songlink,
            resolver,
        }
    }

    pub fn apple_music(resolver: Arc<OdesliResolver>) -> Self {
        Self {
            source: TrackSource::AppleMusic,
            resolver,
        }
    }
}

/// The link handed to Odesli, which is also the link offered to the user
/// when resolution fails.
pub fn resolution_url(track: &PlayableTrack) -> String {
    if let Some(url) = track.url.as_deref().filter(|url| !url.is_empty()) {
        return url.to_string();
    }
    if track.source_id.starts_with("http") {
        return track.source_id.clone();
    }
    match track.source {
        TrackSource::AppleMusic => format!("https://music.apple.com/album/{}", track.source_id),
        _ => format!("https://song.link/{}", track.source_id),
    }
}

#[async_trait]
impl PlatformAdapter for ResolvingAdapter {
    fn source(&self) -> TrackSource {
        self.source
    }

    #[instrument(skip_all, fields(mount_id = ctx.mount_id, source = %self.source))]
    async fn run(&self, mut ctx: AdapterContext) {
        ctx.ready(false);

        loop {
            if let Some(request) = ctx.take_load() {
                let url = resolution_url(&request.track);
                debug!(url = %url, "Resolving");

                let resolution = tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    resolution = self.resolver.resolve(&url) => resolution,
                };

                if resolution.is_resolved() {
                    info!(
                        url = %url,
                        platform = ?resolution.platform,
                        "Link resolved"
                    );
                    ctx.emit(AdapterEvent::Resolved(resolution));
                } else {
                    let failure = resolution
                        .failure
                        .clone()
                        .unwrap_or(ResolverError::NoSupportedPlatform);
                    warn!(url = %url, error = %failure, "Link could not be resolved");
                    ctx.emit(AdapterEvent::Unresolvable {
                        error: PlaybackError::Resolution(failure),
                        external_url: url,
                    });
                }
            }

            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                changed = ctx.loads.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Resolving adapter torn down");
    }
}
