use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ResolverError;

/// Platforms a cross-link can resolve to, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedPlatform {
    Youtube,
    Spotify,
    Soundcloud,
}

impl ResolvedPlatform {
    pub const PRIORITY: [ResolvedPlatform; 3] = [
        ResolvedPlatform::Youtube,
        ResolvedPlatform::Spotify,
        ResolvedPlatform::Soundcloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedPlatform::Youtube => "youtube",
            ResolvedPlatform::Spotify => "spotify",
            ResolvedPlatform::Soundcloud => "soundcloud",
        }
    }
}

impl fmt::Display for ResolvedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One playable cross-link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLink {
    pub platform: ResolvedPlatform,
    pub platform_id: String,
    pub url: String,
}

/// Outcome of resolving one ambiguous URL.
///
/// Success and failure share the shape: on failure `platform`,
/// `platform_id` and `url` are `None` and `error` carries the message.
/// Metadata survives a "no supported platform" failure so the UI can
/// still label the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub platform: Option<ResolvedPlatform>,
    pub platform_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every supported link found, best first. `candidates[0]` is the
    /// winner; the rest are fallbacks if its player cannot play it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ResolvedLink>,
    #[serde(skip)]
    pub failure: Option<ResolverError>,
}

impl Resolution {
    pub(crate) fn success(candidates: Vec<ResolvedLink>, metadata: EntityMetadata) -> Option<Self> {
        let best = candidates.first()?.clone();
        Some(Self {
            platform: Some(best.platform),
            platform_id: Some(best.platform_id),
            url: Some(best.url),
            title: metadata.title,
            artist: metadata.artist,
            thumbnail: metadata.thumbnail,
            error: None,
            candidates,
            failure: None,
        })
    }

    pub(crate) fn failure(error: ResolverError, metadata: EntityMetadata) -> Self {
        Self {
            title: metadata.title,
            artist: metadata.artist,
            thumbnail: metadata.thumbnail,
            error: Some(error.to_string()),
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.platform.is_some() && self.platform_id.is_some()
    }

    pub fn best(&self) -> Option<&ResolvedLink> {
        self.candidates.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EntityMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
}

/// Snapshot of the resolver's cache and request budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    /// Requests counted inside the current window.
    pub request_count: usize,
    /// Unix ms of the oldest counted request, if any.
    pub window_start: Option<i64>,
    pub rate_limit: u32,
}

// ----------------------------------------------------------------------------
// Odesli wire format, as relayed by the backend proxy
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OdesliApiResponse {
    #[serde(default)]
    pub entity_unique_id: String,
    #[serde(default)]
    pub entities_by_unique_id: HashMap<String, OdesliEntity>,
    #[serde(default)]
    pub links_by_platform: HashMap<String, OdesliPlatformLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OdesliEntity {
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OdesliPlatformLink {
    #[serde(default)]
    pub url: String,
}

impl OdesliApiResponse {
    pub fn metadata(&self) -> EntityMetadata {
        let non_empty = |value: &Option<String>| value.clone().filter(|s| !s.is_empty());
        self.entities_by_unique_id
            .get(&self.entity_unique_id)
            .map(|entity| EntityMetadata {
                title: non_empty(&entity.title),
                artist: non_empty(&entity.artist_name),
                thumbnail: non_empty(&entity.thumbnail_url),
            })
            .unwrap_or_default()
    }

    pub fn link(&self, platform: ResolvedPlatform) -> Option<&str> {
        self.links_by_platform
            .get(platform.as_str())
            .map(|link| link.url.as_str())
            .filter(|url| !url.is_empty())
    }
}
