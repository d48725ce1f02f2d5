use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before expiry at which an access token is treated as expired.
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth providers the player authenticates against.
///
/// Only Spotify needs a user token today: the Web Playback SDK and the
/// Connect REST API both reject anonymous callers.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// assert_eq!(ProviderKind::Spotify.as_str(), "spotify");
/// assert_eq!(ProviderKind::parse("Spotify"), Some(ProviderKind::Spotify));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Spotify,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Spotify => "Spotify",
        }
    }

    /// Identifier used in storage keys, events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Spotify => "spotify",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "spotify" => Some(ProviderKind::Spotify),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// OAuth 2.0 token set.
///
/// The `Debug` implementation redacts both tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Spotify omits the refresh token on some refresh responses; the
    /// previous one stays valid in that case.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Build a token set that expires `expires_in` seconds after `issued_at`.
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: issued_at + Duration::seconds(expires_in),
        }
    }

    /// Expired, or expiring within [`TOKEN_EXPIRY_BUFFER_SECS`] of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_expired_with_buffer(now, TOKEN_EXPIRY_BUFFER_SECS)
    }

    pub fn is_expired_with_buffer(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now >= self.expires_at - Duration::seconds(buffer_seconds)
    }

    /// Returns `None` once the token has expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where a provider's sign-in currently stands.
///
/// ```text
/// SignedOut -> SigningIn -> SignedIn
///     ^                        |
///     +------- sign_out -------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    /// A PKCE verifier is stored and the user is at the authorize page.
    SigningIn,
    SignedIn,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "Signed Out"),
            AuthState::SigningIn => write!(f, "Signing In..."),
            AuthState::SignedIn => write!(f, "Signed In"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_provider_kind_round_trip() {
        assert_eq!(ProviderKind::Spotify.display_name(), "Spotify");
        assert_eq!(ProviderKind::parse("SPOTIFY"), Some(ProviderKind::Spotify));
        assert_eq!(ProviderKind::parse("deezer"), None);
        assert_eq!(
            serde_json::to_string(&ProviderKind::Spotify).unwrap(),
            "\"spotify\""
        );
    }

    #[test]
    fn test_expiry_uses_sixty_second_buffer() {
        let tokens = OAuthTokens::new("a".into(), Some("r".into()), 3600, at(1_000));

        assert!(!tokens.is_expired(at(1_000)));
        assert!(!tokens.is_expired(at(1_000 + 3539)));
        assert!(tokens.is_expired(at(1_000 + 3540)));
        assert!(tokens.is_expired(at(1_000 + 7200)));
    }

    #[test]
    fn test_time_until_expiry() {
        let tokens = OAuthTokens::new("a".into(), None, 100, at(0));
        assert_eq!(tokens.time_until_expiry(at(40)), Some(Duration::seconds(60)));
        assert_eq!(tokens.time_until_expiry(at(100)), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = OAuthTokens::new("secret-access".into(), Some("secret-refresh".into()), 60, at(0));
        let debug = format!("{:?}", tokens);

        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_auth_state() {
        assert_eq!(AuthState::default(), AuthState::SignedOut);
        assert!(AuthState::SignedIn.is_authenticated());
        assert!(!AuthState::SigningIn.is_authenticated());
        assert_eq!(AuthState::SigningIn.to_string(), "Signing In...");
    }
}
