//! OAuth 2.0 Authorization Code Flow with PKCE
//!
//! Implements RFC 6749 and RFC 7636 for public clients. The player has no
//! client secret; possession of the code verifier is the proof.
//!
//! # Overview
//!
//! - Building authorization URLs with an S256 challenge
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens with bounded retries
//!
//! Token values, codes and verifiers are never logged.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
//! use core_auth::ProviderKind;
//! use std::sync::Arc;
//!
//! # fn example(
//! #     http_client: Arc<dyn bridge_traits::HttpClient>,
//! #     clock: Arc<dyn bridge_traits::Clock>,
//! # ) -> core_auth::Result<()> {
//! let config = OAuthConfig {
//!     provider: ProviderKind::Spotify,
//!     client_id: "client-id".to_string(),
//!     redirect_uri: "http://localhost:3000/callback".to_string(),
//!     scopes: vec!["streaming".to_string()],
//!     auth_url: "https://accounts.spotify.com/authorize".to_string(),
//!     token_url: "https://accounts.spotify.com/api/token".to_string(),
//! };
//!
//! let flow = OAuthFlowManager::new(config, http_client, clock);
//! let verifier = PkceVerifier::new();
//! let url = flow.build_auth_url("opaque-state", &verifier)?;
//! // Send the user to `url`...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::time::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

const MAX_REFRESH_ATTEMPTS: u32 = 3;
const REFRESH_BASE_DELAY_MS: u64 = 100;

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub provider: ProviderKind,
    pub client_id: String,
    /// Must match the registered redirect exactly, without a trailing slash.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

/// PKCE code verifier.
///
/// Only the challenge derived from it is sent to the authorize page; the
/// verifier itself is kept in secure storage across the redirect and sent
/// to the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceVerifier {
    verifier: String,
}

impl PkceVerifier {
    /// 32 random bytes, URL-safe base64 without padding (43 characters).
    pub fn new() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        Self {
            verifier: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// Rebuild a verifier read back from storage.
    pub fn from_secret(verifier: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// S256: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

/// Drives the authorization code flow against one provider.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthFlowManager {
    pub fn new(
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            http_client,
            clock,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the URL the user should visit to authorize the application.
    ///
    /// `state` is passed through verbatim and comes back on the callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization URL does not parse.
    #[instrument(skip(self, state, verifier), fields(provider = %self.config.provider))]
    pub fn build_auth_url(&self, state: &str, verifier: &PkceVerifier) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", state)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &verifier.challenge());

        debug!("Built authorization URL");
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NetworkError`] when the token endpoint is unreachable
    /// - [`AuthError::InvalidAuthCode`] when it answers with a non-2xx status
    #[instrument(skip(self, code, verifier), fields(provider = %self.config.provider))]
    pub async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<OAuthTokens> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        let body = serde_urlencoded::to_string(&params[..])
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        debug!("Exchanging authorization code for tokens");

        let request =
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone()).form(body);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status, error = %error_body, "Token exchange failed");
            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        info!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code for tokens"
        );
        Ok(token_response.into_tokens(None, self.clock.now()))
    }

    /// Refresh an access token.
    ///
    /// 4xx answers fail immediately. 5xx answers are retried up to three
    /// attempts with exponential backoff (100ms, 200ms). When the provider
    /// does not rotate the refresh token the old one is carried over.
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        let body = serde_urlencoded::to_string(&params[..])
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        let mut attempts = 0;
        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .form(body.clone());
            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response.json().map_err(|e| {
                    AuthError::Other(format!("Failed to parse token response: {}", e))
                })?;
                info!(
                    expires_in = token_response.expires_in,
                    "Refreshed access token"
                );
                return Ok(token_response.into_tokens(Some(refresh_token), self.clock.now()));
            }

            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if response.is_client_error() {
                warn!(status, error = %error_body, "Token refresh rejected");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(REFRESH_BASE_DELAY_MS * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// JSON body of a token endpoint response.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_tokens(
        self,
        previous_refresh: Option<&str>,
        issued_at: chrono::DateTime<chrono::Utc>,
    ) -> OAuthTokens {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string));
        OAuthTokens::new(self.access_token, refresh_token, self.expires_in, issued_at)
    }
}

fn default_expires_in() -> i64 {
    3600
}
