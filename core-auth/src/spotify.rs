//! Spotify sign-in
//!
//! Wraps the PKCE flow, token persistence and the pending-track `state`
//! codec into the three calls the app makes: [`SpotifyAuthenticator::begin_login`]
//! before redirecting, [`SpotifyAuthenticator::handle_callback`] on return,
//! and [`SpotifyAuthenticator::access_token`] whenever the player needs a
//! bearer token.

use async_trait::async_trait;
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use bridge_traits::HttpClient;
use core_runtime::config::SpotifyAppConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
use crate::pending::{AuthorizationState, PendingTrackEnvelope};
use crate::token_store::TokenStore;
use crate::types::{AuthState, OAuthTokens, ProviderKind};

pub const VERIFIER_KEY: &str = "spotify_code_verifier";
const CSRF_KEY: &str = "spotify_oauth_csrf";

/// Source of bearer tokens for the Spotify player.
///
/// The Web Playback SDK asks for a token at connect time and the Connect
/// REST calls need one per request; both go through this trait so the
/// player never sees the refresh machinery.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A token valid for at least the next minute.
    async fn access_token(&self) -> Result<String>;
}

/// What a completed authorization hands back to the app.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub tokens: OAuthTokens,
    /// The track the user was trying to play, if any. Staleness is not
    /// checked here; recovery decides whether to restore it.
    pub pending_track: Option<PendingTrackEnvelope>,
}

pub struct SpotifyAuthenticator {
    flow: OAuthFlowManager,
    token_store: TokenStore,
    secure_store: Arc<dyn SecureStore>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<OAuthTokens>>,
    event_bus: Option<EventBus>,
}

impl SpotifyAuthenticator {
    pub fn new(
        app: &SpotifyAppConfig,
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let accounts = app.accounts_base_url.trim_end_matches('/');
        let config = OAuthConfig {
            provider: ProviderKind::Spotify,
            client_id: app.client_id.clone(),
            redirect_uri: app.redirect_uri.trim_end_matches('/').to_string(),
            scopes: app.scopes.clone(),
            auth_url: format!("{}/authorize", accounts),
            token_url: format!("{}/api/token", accounts),
        };

        Self {
            flow: OAuthFlowManager::new(config, http_client, clock.clone()),
            token_store: TokenStore::new(secure_store.clone()),
            secure_store,
            clock,
            cached: Mutex::new(None),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Start a sign-in and return the authorize URL to redirect to.
    ///
    /// Any half-finished previous attempt is discarded. The verifier and
    /// csrf token go to secure storage; `pending` travels in `state`.
    #[instrument(skip(self, pending), fields(has_pending_track = pending.is_some()))]
    pub async fn begin_login(&self, pending: Option<PendingTrackEnvelope>) -> Result<String> {
        let has_pending_track = pending.is_some();
        let verifier = PkceVerifier::new();
        let state = AuthorizationState::new(pending);

        self.put_secret(VERIFIER_KEY, verifier.verifier()).await?;
        self.put_secret(CSRF_KEY, &state.csrf).await?;

        let url = self.flow.build_auth_url(&state.encode()?, &verifier)?;

        info!("Redirecting to Spotify authorization");
        self.emit(AuthEvent::AuthorizationStarted {
            provider: ProviderKind::Spotify.as_str().to_string(),
            has_pending_track,
        });
        Ok(url)
    }

    /// Finish a sign-in from the callback's `code` and `state`.
    ///
    /// The stored verifier and csrf are consumed whether or not the
    /// exchange succeeds, so a callback URL cannot be replayed.
    #[instrument(skip(self, code, state))]
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<CallbackOutcome> {
        let result = self.complete_callback(code, state).await;
        if let Err(e) = &result {
            warn!(error = %e, "Spotify authorization failed");
            self.emit(AuthEvent::AuthError {
                provider: ProviderKind::Spotify.as_str().to_string(),
                message: e.to_string(),
                recoverable: e.is_recoverable(),
            });
        }
        result
    }

    async fn complete_callback(&self, code: &str, state: &str) -> Result<CallbackOutcome> {
        let decoded = AuthorizationState::decode(state)?;
        let expected_csrf = self.take_secret(CSRF_KEY).await?;
        let verifier = self.take_secret(VERIFIER_KEY).await?;

        if expected_csrf.as_deref() != Some(decoded.csrf.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        let verifier = verifier.ok_or(AuthError::MissingVerifier)?;

        let tokens = self
            .flow
            .exchange_code(code, &PkceVerifier::from_secret(verifier))
            .await?;
        self.token_store
            .store_tokens(ProviderKind::Spotify, &tokens)
            .await?;
        *self.cached.lock().await = Some(tokens.clone());

        info!(
            has_pending_track = decoded.pending_track.is_some(),
            "Spotify sign-in complete"
        );
        self.emit(AuthEvent::SignedIn {
            provider: ProviderKind::Spotify.as_str().to_string(),
        });

        Ok(CallbackOutcome {
            tokens,
            pending_track: decoded.pending_track,
        })
    }

    /// Current access token, refreshed first if it is within a minute of
    /// expiring.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when no tokens are stored, or when
    /// they expired and there is no refresh token to renew them.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.token_store.retrieve_tokens(ProviderKind::Spotify).await?;
        }
        let Some(current) = cached.clone() else {
            return Err(AuthError::NotAuthenticated);
        };

        if !current.is_expired(self.clock.now()) {
            return Ok(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            debug!("Access token expired with no refresh token");
            *cached = None;
            self.token_store.delete_tokens(ProviderKind::Spotify).await?;
            return Err(AuthError::NotAuthenticated);
        };

        match self.flow.refresh_access_token(refresh_token).await {
            Ok(fresh) => {
                self.token_store
                    .store_tokens(ProviderKind::Spotify, &fresh)
                    .await?;
                self.emit(AuthEvent::TokenRefreshed {
                    provider: ProviderKind::Spotify.as_str().to_string(),
                    expires_at: fresh.expires_at.timestamp(),
                });
                let token = fresh.access_token.clone();
                *cached = Some(fresh);
                Ok(token)
            }
            Err(e) => {
                self.emit(AuthEvent::AuthError {
                    provider: ProviderKind::Spotify.as_str().to_string(),
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                Err(e)
            }
        }
    }

    pub async fn auth_state(&self) -> Result<AuthState> {
        if self.cached.lock().await.is_some()
            || self.token_store.has_tokens(ProviderKind::Spotify).await?
        {
            return Ok(AuthState::SignedIn);
        }
        let signing_in = self
            .secure_store
            .has_secret(VERIFIER_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;
        Ok(if signing_in {
            AuthState::SigningIn
        } else {
            AuthState::SignedOut
        })
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.auth_state().await, Ok(AuthState::SignedIn))
    }

    /// Forget tokens and any in-flight authorization.
    pub async fn sign_out(&self) -> Result<()> {
        *self.cached.lock().await = None;
        self.token_store.delete_tokens(ProviderKind::Spotify).await?;
        self.take_secret(VERIFIER_KEY).await?;
        self.take_secret(CSRF_KEY).await?;

        info!("Signed out of Spotify");
        self.emit(AuthEvent::SignedOut {
            provider: ProviderKind::Spotify.as_str().to_string(),
        });
        Ok(())
    }

    async fn put_secret(&self, key: &str, value: &str) -> Result<()> {
        self.secure_store
            .set_secret(key, value.as_bytes())
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }

    /// Read and delete in one step.
    async fn take_secret(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .secure_store
            .get_secret(key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;
        self.secure_store
            .delete_secret(key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        value
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|_| AuthError::TokenCorrupted(format!("{} is not UTF-8", key)))
            })
            .transpose()
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }
}

#[async_trait]
impl AccessTokenProvider for SpotifyAuthenticator {
    async fn access_token(&self) -> Result<String> {
        SpotifyAuthenticator::access_token(self).await
    }
}
