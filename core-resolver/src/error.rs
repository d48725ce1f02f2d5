use thiserror::Error;

/// Why a link could not be resolved.
///
/// The display strings are what the player shows next to the "open
/// externally" link, so they are kept short and user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Rate limit exceeded ({max_requests} requests/minute). Please wait a moment.")]
    RateLimited { max_requests: u32 },

    #[error("Odesli API returned {0}")]
    HttpStatus(u16),

    #[error("Failed to resolve: {0}")]
    Transport(String),

    #[error("No supported platforms found (YouTube, Spotify, or SoundCloud)")]
    NoSupportedPlatform,
}

impl ResolverError {
    /// Only a deterministic answer is worth remembering. Network and
    /// budget failures may succeed on a later attempt.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, ResolverError::NoSupportedPlatform)
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ResolverError::RateLimited { max_requests: 10 }.to_string(),
            "Rate limit exceeded (10 requests/minute). Please wait a moment."
        );
        assert_eq!(ResolverError::HttpStatus(502).to_string(), "Odesli API returned 502");
        assert_eq!(
            ResolverError::Transport("connection reset".into()).to_string(),
            "Failed to resolve: connection reset"
        );
    }

    #[test]
    fn test_only_no_platform_is_cacheable() {
        assert!(ResolverError::NoSupportedPlatform.is_cacheable());
        assert!(!ResolverError::HttpStatus(500).is_cacheable());
        assert!(!ResolverError::Transport("x".into()).is_cacheable());
        assert!(!ResolverError::RateLimited { max_requests: 10 }.is_cacheable());
    }
}
