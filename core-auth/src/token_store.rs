//! Secure Token Storage
//!
//! Persists OAuth tokens through the host's [`SecureStore`] so a signed-in
//! user stays signed in across restarts. Tokens are stored as JSON under
//! `oauth_tokens:{provider}`; their values never reach a log line.

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind};
use bridge_traits::storage::SecureStore;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secure storage for OAuth tokens, one set per provider.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

/// On-disk shape. `expires_at` is Unix seconds.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: i64,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Store tokens for a provider, overwriting any previous set.
    pub async fn store_tokens(&self, provider: ProviderKind, tokens: &OAuthTokens) -> Result<()> {
        let stored = StoredTokens {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at.timestamp(),
        };

        let json = serde_json::to_vec(&stored).map_err(|e| {
            warn!(provider = %provider.as_str(), error = %e, "Failed to serialize tokens");
            AuthError::SerializationFailed(e.to_string())
        })?;

        self.secure_store
            .set_secret(&Self::storage_key(provider), &json)
            .await
            .map_err(|e| {
                warn!(provider = %provider.as_str(), error = %e, "Failed to store tokens");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            provider = %provider.as_str(),
            has_refresh_token = stored.refresh_token.is_some(),
            "Tokens stored securely"
        );
        Ok(())
    }

    /// Load tokens for a provider.
    ///
    /// Corrupted entries are deleted and reported as
    /// [`AuthError::TokenCorrupted`]; the next call then sees `Ok(None)`.
    pub async fn retrieve_tokens(&self, provider: ProviderKind) -> Result<Option<OAuthTokens>> {
        let key = Self::storage_key(provider);

        let data = self.secure_store.get_secret(&key).await.map_err(|e| {
            warn!(provider = %provider.as_str(), error = %e, "Failed to read tokens");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!(provider = %provider.as_str(), "No tokens found in storage");
            return Ok(None);
        };

        let stored: StoredTokens = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    provider = %provider.as_str(),
                    error = %e,
                    "Stored tokens are unreadable, discarding them"
                );
                if let Err(delete_err) = self.secure_store.delete_secret(&key).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token data");
                }
                return Err(AuthError::TokenCorrupted(e.to_string()));
            }
        };

        let expires_at = Utc
            .timestamp_opt(stored.expires_at, 0)
            .single()
            .ok_or_else(|| AuthError::TokenCorrupted("expiry out of range".to_string()))?;

        Ok(Some(OAuthTokens {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at,
        }))
    }

    /// Idempotent: deleting absent tokens succeeds.
    pub async fn delete_tokens(&self, provider: ProviderKind) -> Result<()> {
        self.secure_store
            .delete_secret(&Self::storage_key(provider))
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;
        info!(provider = %provider.as_str(), "Tokens deleted");
        Ok(())
    }

    pub async fn has_tokens(&self, provider: ProviderKind) -> Result<bool> {
        self.secure_store
            .has_secret(&Self::storage_key(provider))
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }

    fn storage_key(provider: ProviderKind) -> String {
        format!("oauth_tokens:{}", provider.as_str())
    }
}
