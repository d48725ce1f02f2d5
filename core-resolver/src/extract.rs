//! Platform id extraction from cross-link URLs.
//!
//! These rules mirror the URL shapes Odesli actually returns; anything that
//! does not parse as a URL yields no id.

use url::Url;

use crate::types::ResolvedPlatform;

pub fn extract_platform_id(platform: ResolvedPlatform, link: &str) -> Option<String> {
    match platform {
        ResolvedPlatform::Youtube => extract_youtube_id(link),
        ResolvedPlatform::Spotify => extract_spotify_id(link),
        ResolvedPlatform::Soundcloud => extract_soundcloud_id(link),
    }
}

/// `youtube.com/watch?v={id}` or `youtu.be/{id}`.
pub fn extract_youtube_id(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;

    if host.contains("youtube.com") {
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty());
    }
    if host == "youtu.be" {
        return Some(url.path().trim_start_matches('/').to_string()).filter(|id| !id.is_empty());
    }
    None
}

/// `/track/{alphanumeric}` on any spotify.com host.
pub fn extract_spotify_id(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if !url.host_str()?.contains("spotify.com") {
        return None;
    }

    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "track" {
            let id: String = segments
                .next()?
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            return Some(id).filter(|id| !id.is_empty());
        }
    }
    None
}

/// SoundCloud has no short id; the canonical URL is the id.
pub fn extract_soundcloud_id(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.host_str()?
        .contains("soundcloud.com")
        .then(|| link.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_watch_and_short_links() {
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_youtube_id("https://music.youtube.com/watch?v=abc"),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_youtube_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(extract_youtube_id("https://www.youtube.com/channel/x"), None);
        assert_eq!(extract_youtube_id("https://vimeo.com/123"), None);
        assert_eq!(extract_youtube_id("not a url"), None);
    }

    #[test]
    fn test_spotify_track_segment() {
        assert_eq!(
            extract_spotify_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=x"),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            extract_spotify_id("https://open.spotify.com/intl-de/track/4uLU6hMCjMI75M1A2tKUQC"),
            Some("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(extract_spotify_id("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3"), None);
        assert_eq!(extract_spotify_id("https://example.com/track/abc"), None);
    }

    #[test]
    fn test_soundcloud_url_is_the_id() {
        let link = "https://soundcloud.com/artist/track-name";
        assert_eq!(extract_soundcloud_id(link), Some(link.to_string()));
        assert_eq!(
            extract_platform_id(ResolvedPlatform::Soundcloud, "https://on.soundcloud.com/xyz"),
            Some("https://on.soundcloud.com/xyz".to_string())
        );
        assert_eq!(extract_soundcloud_id("https://bandcamp.com/x"), None);
    }
}
