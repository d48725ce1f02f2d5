//! # Player Configuration
//!
//! [`PlayerConfig`] gathers the settings and host capabilities a playback
//! session needs. It is built once through [`PlayerConfigBuilder`], which
//! fails fast on anything missing or malformed.
//!
//! ## Required capabilities
//!
//! - `HttpClient`: backend proxy, Spotify, oEmbed (desktop default: reqwest)
//! - `SecureStore`: OAuth tokens and PKCE verifier (desktop default: keyring)
//!
//! `Clock` defaults to the system clock everywhere.
//!
//! ## Environment
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `VITE_API_URL` / `PLAYER_API_URL` | backend base URL | `http://localhost:3000` |
//! | `SPOTIFY_CLIENT_ID` | enables Spotify login | unset |
//! | `SPOTIFY_REDIRECT_URI` | OAuth callback | required when a client id is set |
//! | `PLAYER_LOG_FORMAT` | `pretty`, `json` or `compact` | build dependent |
//!
//! ```ignore
//! use core_runtime::config::PlayerConfig;
//!
//! let config = PlayerConfig::builder().from_env().build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LoggingConfig};
use bridge_traits::{Clock, HttpClient, SecureStore, SystemClock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const SPOTIFY_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Scopes needed for the Web Playback SDK plus Connect control.
pub const SPOTIFY_DEFAULT_SCOPES: &[&str] = &[
    "streaming",
    "user-read-email",
    "user-read-private",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
];

/// Spotify application registration used by the PKCE flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyAppConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub accounts_base_url: String,
    pub api_base_url: String,
}

impl SpotifyAppConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: SPOTIFY_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            accounts_base_url: SPOTIFY_ACCOUNTS_BASE_URL.to_string(),
            api_base_url: SPOTIFY_API_BASE_URL.to_string(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Point both Spotify hosts somewhere else (test servers).
    pub fn with_base_urls(
        mut self,
        accounts_base_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        self.accounts_base_url = accounts_base_url.into();
        self.api_base_url = api_base_url.into();
        self
    }

    /// Space separated, as the authorize endpoint expects.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("Spotify client id cannot be empty".to_string()));
        }
        if !is_http_url(&self.redirect_uri) {
            return Err(Error::Config(format!(
                "Spotify redirect URI must be an http(s) URL, got '{}'",
                self.redirect_uri
            )));
        }
        if !is_http_url(&self.accounts_base_url) || !is_http_url(&self.api_base_url) {
            return Err(Error::Config("Spotify base URLs must be http(s) URLs".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("At least one Spotify scope is required".to_string()));
        }
        Ok(())
    }
}

/// Budget for the link-resolution proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverLimits {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Settings and capabilities for one playback session.
#[derive(Clone)]
pub struct PlayerConfig {
    /// Backend base URL; hosts `/api/odesli/resolve` and `/api/music`.
    pub api_base_url: String,
    pub spotify: Option<SpotifyAppConfig>,
    pub resolver: ResolverLimits,
    pub event_buffer_size: usize,
    pub logging: LoggingConfig,
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("api_base_url", &self.api_base_url)
            .field("spotify", &self.spotify)
            .field("resolver", &self.resolver)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("logging", &self.logging)
            .field("http_client", &"Arc<dyn HttpClient>")
            .field("secure_store", &"Arc<dyn SecureStore>")
            .finish()
    }
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Backend base with any trailing slash removed.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base_url) {
            return Err(Error::Config(format!(
                "API base URL must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        if self.resolver.max_requests == 0 {
            return Err(Error::Config(
                "Resolver rate limit must allow at least one request".to_string(),
            ));
        }
        if self.resolver.window.is_zero() {
            return Err(Error::Config(
                "Resolver rate limit window must be non-zero".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(Error::Config("Event buffer size must be > 0".to_string()));
        }
        if let Some(spotify) = &self.spotify {
            spotify.validate()?;
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client provided. Desktop: enable the 'desktop-shims' feature. \
                  Other hosts: inject a platform HttpClient."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore is required to keep Spotify tokens. Desktop: enable the \
                  'desktop-shims' feature. Web: inject a session-storage backed store."
            .to_string(),
    })
}

/// Builder for [`PlayerConfig`].
#[derive(Default)]
pub struct PlayerConfigBuilder {
    api_base_url: Option<String>,
    spotify_client_id: Option<String>,
    spotify_redirect_uri: Option<String>,
    spotify: Option<SpotifyAppConfig>,
    resolver: Option<ResolverLimits>,
    event_buffer_size: Option<usize>,
    logging: Option<LoggingConfig>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PlayerConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn spotify(mut self, spotify: SpotifyAppConfig) -> Self {
        self.spotify = Some(spotify);
        self
    }

    pub fn resolver_limits(mut self, limits: ResolverLimits) -> Self {
        self.resolver = Some(limits);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Read settings from the process environment.
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Values already set on the builder
    /// win over looked-up ones.
    pub fn from_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_base_url.is_none() {
            self.api_base_url = non_empty("VITE_API_URL").or_else(|| non_empty("PLAYER_API_URL"));
        }
        if self.spotify_client_id.is_none() {
            self.spotify_client_id = non_empty("SPOTIFY_CLIENT_ID");
        }
        if self.spotify_redirect_uri.is_none() {
            self.spotify_redirect_uri = non_empty("SPOTIFY_REDIRECT_URI");
        }
        if let Some(format) = non_empty("PLAYER_LOG_FORMAT").and_then(|f| LogFormat::parse(&f)) {
            let logging = self.logging.take().unwrap_or_default();
            self.logging = Some(logging.with_format(format));
        }
        self
    }

    pub fn build(self) -> Result<PlayerConfig> {
        let spotify = match (self.spotify, self.spotify_client_id, self.spotify_redirect_uri) {
            (Some(explicit), _, _) => Some(explicit),
            (None, Some(client_id), Some(redirect_uri)) => {
                Some(SpotifyAppConfig::new(client_id, redirect_uri))
            }
            (None, Some(_), None) => {
                return Err(Error::Config(
                    "SPOTIFY_CLIENT_ID is set but SPOTIFY_REDIRECT_URI is missing".to_string(),
                ))
            }
            (None, None, _) => None,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };
        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = PlayerConfig {
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            spotify,
            resolver: self.resolver.unwrap_or_default(),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            logging: self.logging.unwrap_or_default(),
            http_client,
            secure_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{HttpRequest, HttpResponse, MemorySecureStore};
    use std::collections::HashMap;

    struct NullHttpClient;

    #[async_trait]
    impl HttpClient for NullHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> bridge_traits::error::Result<HttpResponse> {
            Ok(HttpResponse::new(204, Vec::new()))
        }
    }

    fn builder() -> PlayerConfigBuilder {
        PlayerConfig::builder()
            .http_client(Arc::new(NullHttpClient))
            .secure_store(Arc::new(MemorySecureStore::new()))
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.spotify.is_none());
        assert_eq!(config.resolver.max_requests, 10);
        assert_eq!(config.resolver.window, Duration::from_secs(60));
    }

    #[test]
    fn test_env_lookup_configures_backend_and_spotify() {
        let config = builder()
            .from_lookup(env(&[
                ("VITE_API_URL", "https://api.example.test/"),
                ("SPOTIFY_CLIENT_ID", "client-123"),
                ("SPOTIFY_REDIRECT_URI", "http://127.0.0.1:5173/callback"),
                ("PLAYER_LOG_FORMAT", "json"),
            ]))
            .build()
            .unwrap();

        assert_eq!(config.api_base(), "https://api.example.test");
        let spotify = config.spotify.unwrap();
        assert_eq!(spotify.client_id, "client-123");
        assert!(spotify.scope_param().starts_with("streaming user-read-email"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_explicit_values_beat_env() {
        let config = builder()
            .api_base_url("http://localhost:4000")
            .from_lookup(env(&[("VITE_API_URL", "https://ignored.test")]))
            .build()
            .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:4000");
    }

    #[test]
    fn test_client_id_without_redirect_is_rejected() {
        let result = builder()
            .from_lookup(env(&[("SPOTIFY_CLIENT_ID", "client-123")]))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_failures() {
        assert!(builder().api_base_url("localhost:3000").build().is_err());
        assert!(builder()
            .resolver_limits(ResolverLimits {
                max_requests: 0,
                window: Duration::from_secs(60),
            })
            .build()
            .is_err());
        assert!(builder()
            .spotify(SpotifyAppConfig::new(" ", "http://127.0.0.1/callback"))
            .build()
            .is_err());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_capability_without_desktop_shims() {
        let result = PlayerConfig::builder().build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }
}
