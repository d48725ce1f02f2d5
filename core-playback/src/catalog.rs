//! # Track Catalog
//!
//! The feed backend is the only place a full track can be recovered from
//! its identifiers. Recovery after an OAuth redirect looks tracks up here.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{PlaybackError, Result};
use crate::types::{PlayableTrack, Track, TrackSource};

const CATALOG_TIMEOUT: Duration = Duration::from_secs(15);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Look up one track by platform name and platform-native id.
    async fn fetch_track(&self, platform: &str, platform_id: &str) -> Result<Track>;
}

/// [`TrackCatalog`] backed by `GET {api}/api/music/{platform}-{id}/casts`.
pub struct HttpTrackCatalog {
    http: Arc<dyn HttpClient>,
    api_base_url: String,
}

impl HttpTrackCatalog {
    pub fn new(http: Arc<dyn HttpClient>, api_base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MusicCastsResponse {
    music: Option<CatalogMusic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogMusic {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    platform: String,
    platform_id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl CatalogMusic {
    fn into_track(self) -> Result<Track> {
        let source = TrackSource::parse(&self.platform).ok_or_else(|| {
            PlaybackError::CatalogFetch(format!("unsupported platform '{}'", self.platform))
        })?;

        let mut playable = PlayableTrack::new(
            self.id,
            source,
            self.platform_id,
            self.title.unwrap_or_else(|| "Unknown Title".to_string()),
            self.artist.unwrap_or_else(|| "Unknown Artist".to_string()),
        );
        playable.url = self.url;
        playable.thumbnail = self.thumbnail;
        Ok(Track::new(playable))
    }
}

#[async_trait]
impl TrackCatalog for HttpTrackCatalog {
    #[instrument(skip(self))]
    async fn fetch_track(&self, platform: &str, platform_id: &str) -> Result<Track> {
        let music_id = format!("{}-{}", platform, platform_id);
        let url = format!(
            "{}/api/music/{}/casts?limit=1",
            self.api_base_url,
            urlencoding::encode(&music_id)
        );

        let response = self
            .http
            .execute(HttpRequest::get(url).timeout(CATALOG_TIMEOUT))
            .await
            .map_err(|e| PlaybackError::CatalogFetch(e.to_string()))?;

        if response.status == 404 {
            return Err(PlaybackError::TrackNotFound(music_id));
        }
        if !response.is_success() {
            return Err(PlaybackError::CatalogFetch(format!(
                "catalog returned {}",
                response.status
            )));
        }

        let body: MusicCastsResponse = response
            .json()
            .map_err(|e| PlaybackError::CatalogFetch(e.to_string()))?;
        let track = body
            .music
            .ok_or_else(|| PlaybackError::TrackNotFound(music_id.clone()))?
            .into_track()?;

        debug!(track_id = %track.id(), "Catalog track fetched");
        Ok(track)
    }
}
