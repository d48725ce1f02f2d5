//! # Playback Error Types
//!
//! Every vendor failure ends up as a [`PlaybackError`] on the single player
//! error surface. The variant decides whether the coordinator skips ahead.

use core_auth::AuthError;
use core_resolver::ResolverError;
use thiserror::Error;

use crate::types::TrackSource;

/// YouTube `onError` codes that mean "this video will never play here".
pub const YOUTUBE_TRACK_ERROR_CODES: [i32; 5] = [2, 5, 100, 101, 150];

/// Errors surfaced by adapters and the coordinator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Player Lifecycle Errors
    // ========================================================================
    /// The vendor script never became available.
    #[error("{platform} player is not available")]
    SdkUnavailable { platform: TrackSource },

    #[error("Failed to initialize {platform} player: {message}")]
    PlayerInit {
        platform: TrackSource,
        message: String,
    },

    /// A transport call on an initialized player failed.
    #[error("{platform} player call failed: {message}")]
    PlayerCall {
        platform: TrackSource,
        message: String,
    },

    // ========================================================================
    // YouTube Errors
    // ========================================================================
    /// Removed, private, not embeddable or malformed id.
    #[error("YouTube video unavailable (error {0}). Skipping...")]
    YouTubeUnavailable(i32),

    #[error("YouTube player error {0}")]
    YouTubePlayer(i32),

    // ========================================================================
    // Spotify Errors
    // ========================================================================
    #[error("Please login to Spotify first")]
    SpotifyLoginRequired,

    #[error("Spotify Premium required")]
    SpotifyPremiumRequired,

    #[error("Spotify authentication failed")]
    SpotifyAuthenticationFailed,

    #[error("Failed to initialize Spotify player")]
    SpotifyInitializationFailed,

    #[error("Spotify playback failed")]
    SpotifyPlaybackFailed,

    /// Connect REST answered with an unexpected status.
    #[error("Spotify playback error: {0}")]
    SpotifyRest(u16),

    /// The request never got an answer; detail goes to the log only.
    #[error("Failed to start Spotify playback")]
    SpotifyTransport(String),

    #[error("Could not play on Spotify - make sure Spotify is open")]
    SpotifyNoActiveDevice,

    // ========================================================================
    // SoundCloud Errors
    // ========================================================================
    #[error("SoundCloud track unavailable. Skipping...")]
    SoundCloudUnavailable,

    #[error("SoundCloud track took too long to load")]
    SoundCloudLoadTimeout,

    // ========================================================================
    // Resolution and Recovery Errors
    // ========================================================================
    #[error("{0}")]
    Resolution(#[from] ResolverError),

    #[error("Failed to fetch track: {0}")]
    CatalogFetch(String),

    #[error("Track not found: {0}")]
    TrackNotFound(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Playback coordinator is not running")]
    CoordinatorStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Map a YouTube `onError` code.
    pub fn from_youtube_code(code: i32) -> Self {
        if YOUTUBE_TRACK_ERROR_CODES.contains(&code) {
            PlaybackError::YouTubeUnavailable(code)
        } else {
            PlaybackError::YouTubePlayer(code)
        }
    }

    /// Whether skipping to the next track can help.
    ///
    /// Track-specific and mid-playback failures skip. Account-level
    /// problems (login, Premium, SDK setup) and resolution failures do not,
    /// since every following track would hit them too or the user is
    /// offered an external link instead.
    pub fn is_auto_skippable(&self) -> bool {
        matches!(
            self,
            PlaybackError::PlayerCall { .. }
                | PlaybackError::YouTubeUnavailable(_)
                | PlaybackError::SpotifyPlaybackFailed
                | PlaybackError::SpotifyRest(_)
                | PlaybackError::SpotifyTransport(_)
                | PlaybackError::SoundCloudUnavailable
                | PlaybackError::SoundCloudLoadTimeout
        )
    }

    /// Text for the player's error line.
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::PlayerCall { platform, .. } => {
                format!("{} playback failed. Skipping...", platform)
            }
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for PlaybackError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotAuthenticated => PlaybackError::SpotifyLoginRequired,
            _ => PlaybackError::SpotifyAuthenticationFailed,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_codes() {
        for code in YOUTUBE_TRACK_ERROR_CODES {
            let error = PlaybackError::from_youtube_code(code);
            assert!(error.is_auto_skippable(), "code {}", code);
        }
        let other = PlaybackError::from_youtube_code(7);
        assert_eq!(other, PlaybackError::YouTubePlayer(7));
        assert!(!other.is_auto_skippable());
    }

    #[test]
    fn test_account_errors_do_not_skip() {
        assert!(!PlaybackError::SpotifyLoginRequired.is_auto_skippable());
        assert!(!PlaybackError::SpotifyPremiumRequired.is_auto_skippable());
        assert!(!PlaybackError::SpotifyNoActiveDevice.is_auto_skippable());
        assert!(PlaybackError::SpotifyPlaybackFailed.is_auto_skippable());
        assert!(PlaybackError::SpotifyRest(500).is_auto_skippable());
    }

    #[test]
    fn test_resolution_errors_do_not_skip() {
        let error = PlaybackError::from(ResolverError::NoSupportedPlatform);
        assert!(!error.is_auto_skippable());
        assert_eq!(
            error.user_message(),
            "No supported platforms found (YouTube, Spotify, or SoundCloud)"
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            PlaybackError::SpotifyRest(502).user_message(),
            "Spotify playback error: 502"
        );
        assert_eq!(
            PlaybackError::SoundCloudLoadTimeout.user_message(),
            "SoundCloud track took too long to load"
        );
        assert_eq!(
            PlaybackError::SpotifyTransport("dns failure".into()).user_message(),
            "Failed to start Spotify playback"
        );
        let call = PlaybackError::PlayerCall {
            platform: TrackSource::Youtube,
            message: "iframe detached".into(),
        };
        assert_eq!(call.user_message(), "youtube playback failed. Skipping...");
    }

    #[test]
    fn test_auth_mapping() {
        assert_eq!(
            PlaybackError::from(AuthError::NotAuthenticated),
            PlaybackError::SpotifyLoginRequired
        );
        assert_eq!(
            PlaybackError::from(AuthError::TokenRefreshFailed("x".into())),
            PlaybackError::SpotifyAuthenticationFailed
        );
    }
}
