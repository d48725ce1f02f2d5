//! Secure Credential Storage
//!
//! OAuth tokens and the PKCE verifier live here. Nothing else the player
//! persists is sensitive, so this is the only storage trait.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts platform secure storage:
/// - macOS/iOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service
/// - Web: session storage (tokens only, never refresh tokens in plain local storage)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn remember_verifier(store: &dyn SecureStore, verifier: &str) -> Result<()> {
///     store.set_secret("spotify_code_verifier", verifier.as_bytes()).await
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}

/// Process-local secret store.
///
/// Used by hosts with no keychain and by tests. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemorySecureStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_delete() {
        let store = MemorySecureStore::new();
        assert!(!store.has_secret("spotify_code_verifier").await.unwrap());

        store
            .set_secret("spotify_code_verifier", b"abc")
            .await
            .unwrap();
        assert_eq!(
            store.get_secret("spotify_code_verifier").await.unwrap(),
            Some(b"abc".to_vec())
        );

        store.delete_secret("spotify_code_verifier").await.unwrap();
        store.delete_secret("spotify_code_verifier").await.unwrap();
        assert!(store.is_empty().await);
    }
}
