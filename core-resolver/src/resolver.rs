//! Odesli (song.link) Resolver
//!
//! Turns a song.link or Apple Music URL into a platform the player can
//! actually play. Calls go through the backend proxy at
//! `{api_base}/api/odesli/resolve?url=...`, which relays Odesli's JSON.
//!
//! ## Behaviour
//!
//! - Cache keyed by the input URL, kept for the life of the resolver. A
//!   hit skips both the network and the request budget.
//! - Sliding request budget (10 per minute by default). Over budget, the
//!   call fails immediately without touching the network.
//! - Priority YouTube, then Spotify, then SoundCloud; the first link with
//!   an extractable id wins.
//! - "No supported platform" is cached. HTTP and transport failures are
//!   not, so the user can retry.

use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::time::Clock;
use core_runtime::config::ResolverLimits;
use core_runtime::events::{CoreEvent, EventBus, ResolverEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{ResolverError, Result};
use crate::extract::extract_platform_id;
use crate::rate_limit::SlidingWindowLimiter;
use crate::types::{
    CacheStats, EntityMetadata, OdesliApiResponse, ResolvedLink, ResolvedPlatform, Resolution,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct OdesliResolver {
    api_base_url: String,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    cache: Mutex<HashMap<String, Resolution>>,
    limiter: Mutex<SlidingWindowLimiter>,
    event_bus: Option<EventBus>,
}

impl OdesliResolver {
    pub fn new(
        api_base_url: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        limits: ResolverLimits,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http_client,
            clock,
            cache: Mutex::new(HashMap::new()),
            limiter: Mutex::new(SlidingWindowLimiter::new(limits.max_requests, limits.window)),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Resolve `url`. Never fails outright; failures come back as a
    /// [`Resolution`] with `error` set.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> Resolution {
        let cached = self.cache.lock().get(url).cloned();
        if let Some(cached) = cached {
            debug!("Resolution cache hit");
            self.emit(ResolverEvent::CacheHit {
                url: url.to_string(),
            });
            return cached;
        }

        let now = self.clock.unix_timestamp_millis();
        let rejected = {
            let mut limiter = self.limiter.lock();
            (!limiter.try_acquire(now)).then(|| limiter.max_requests())
        };
        if let Some(max_requests) = rejected {
            let error = ResolverError::RateLimited { max_requests };
            warn!(%error, "Resolution rejected by request budget");
            self.emit(ResolverEvent::RateLimited {
                url: url.to_string(),
            });
            return Resolution::failure(error, EntityMetadata::default());
        }

        let resolution = match self.fetch(url).await {
            Ok(response) => Self::pick_platform(&response),
            Err(error) => {
                warn!(%error, "Resolution request failed");
                Resolution::failure(error, EntityMetadata::default())
            }
        };

        let cacheable = resolution
            .failure
            .as_ref()
            .map_or(true, ResolverError::is_cacheable);
        if cacheable {
            self.cache.lock().insert(url.to_string(), resolution.clone());
        }

        match (resolution.best(), resolution.error.as_ref()) {
            (Some(best), _) => {
                info!(platform = %best.platform, platform_id = %best.platform_id, "Link resolved");
                self.emit(ResolverEvent::Resolved {
                    url: url.to_string(),
                    platform: best.platform.as_str().to_string(),
                    platform_id: best.platform_id.clone(),
                });
            }
            (None, Some(message)) => self.emit(ResolverEvent::Failed {
                url: url.to_string(),
                message: message.clone(),
                cached: cacheable,
            }),
            (None, None) => {}
        }

        resolution
    }

    /// Drop every cached resolution. The request budget is unaffected.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        debug!("Resolution cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let now = self.clock.unix_timestamp_millis();
        let mut limiter = self.limiter.lock();
        CacheStats {
            size: self.cache.lock().len(),
            request_count: limiter.request_count(now),
            window_start: limiter.window_start(now),
            rate_limit: limiter.max_requests(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<OdesliApiResponse> {
        let endpoint = format!(
            "{}/api/odesli/resolve?url={}",
            self.api_base_url,
            urlencoding::encode(url)
        );
        debug!(endpoint = %endpoint, "Fetching resolution via backend proxy");

        let request = HttpRequest::get(endpoint).timeout(REQUEST_TIMEOUT);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(ResolverError::HttpStatus(response.status));
        }

        response
            .json()
            .map_err(|e| ResolverError::Transport(e.to_string()))
    }

    fn pick_platform(response: &OdesliApiResponse) -> Resolution {
        let candidates: Vec<ResolvedLink> = ResolvedPlatform::PRIORITY
            .iter()
            .filter_map(|&platform| {
                let url = response.link(platform)?;
                let platform_id = extract_platform_id(platform, url)?;
                Some(ResolvedLink {
                    platform,
                    platform_id,
                    url: url.to_string(),
                })
            })
            .collect();

        let metadata = response.metadata();
        Resolution::success(candidates, metadata.clone())
            .unwrap_or_else(|| Resolution::failure(ResolverError::NoSupportedPlatform, metadata))
    }

    fn emit(&self, event: ResolverEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Resolver(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OdesliApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_priority_prefers_youtube() {
        let response = parse(
            r#"{
                "entityUniqueId": "ITUNES_SONG::1",
                "entitiesByUniqueId": {
                    "ITUNES_SONG::1": {"title": "Song", "artistName": "Band", "thumbnailUrl": "https://img/1.jpg"}
                },
                "linksByPlatform": {
                    "soundcloud": {"url": "https://soundcloud.com/band/song"},
                    "spotify": {"url": "https://open.spotify.com/track/abc123"},
                    "youtube": {"url": "https://www.youtube.com/watch?v=yt1"}
                }
            }"#,
        );

        let resolution = OdesliResolver::pick_platform(&response);
        assert_eq!(resolution.platform, Some(ResolvedPlatform::Youtube));
        assert_eq!(resolution.platform_id.as_deref(), Some("yt1"));
        assert_eq!(resolution.title.as_deref(), Some("Song"));
        assert_eq!(resolution.artist.as_deref(), Some("Band"));
        let order: Vec<_> = resolution.candidates.iter().map(|c| c.platform).collect();
        assert_eq!(
            order,
            vec![
                ResolvedPlatform::Youtube,
                ResolvedPlatform::Spotify,
                ResolvedPlatform::Soundcloud
            ]
        );
    }

    #[test]
    fn test_unextractable_link_falls_through() {
        let response = parse(
            r#"{
                "entityUniqueId": "x",
                "linksByPlatform": {
                    "youtube": {"url": "https://www.youtube.com/channel/abc"},
                    "spotify": {"url": "https://open.spotify.com/track/sp1"}
                }
            }"#,
        );

        let resolution = OdesliResolver::pick_platform(&response);
        assert_eq!(resolution.platform, Some(ResolvedPlatform::Spotify));
        assert_eq!(resolution.candidates.len(), 1);
        assert!(resolution.title.is_none());
    }

    #[test]
    fn test_no_supported_platform_keeps_metadata() {
        let response = parse(
            r#"{
                "entityUniqueId": "e",
                "entitiesByUniqueId": {"e": {"title": "Only On Apple"}},
                "linksByPlatform": {"appleMusic": {"url": "https://music.apple.com/album/1"}}
            }"#,
        );

        let resolution = OdesliResolver::pick_platform(&response);
        assert!(!resolution.is_resolved());
        assert_eq!(resolution.failure, Some(ResolverError::NoSupportedPlatform));
        assert_eq!(
            resolution.error.as_deref(),
            Some("No supported platforms found (YouTube, Spotify, or SoundCloud)")
        );
        assert_eq!(resolution.title.as_deref(), Some("Only On Apple"));
    }
}
