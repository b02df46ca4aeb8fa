//! Persistence hook for refreshed tokens.

use super::tokens::TokenPair;
use async_trait::async_trait;
use std::sync::Mutex;

/// Error reported by a [`CredentialStore`].
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Saves credentials after every successful token exchange.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist the current token pair.
    async fn save(&self, tokens: &TokenPair) -> Result<(), StoreError>;
}

/// Store that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCredentialStore;

#[async_trait]
impl CredentialStore for NoopCredentialStore {
    async fn save(&self, _tokens: &TokenPair) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store keeping every saved pair, newest last.
pub struct InMemoryCredentialStore {
    saved: Mutex<Vec<TokenPair>>,
    fail: bool,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Creates a store whose saves always fail.
    pub fn failing() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Most recently saved pair.
    pub fn last_saved(&self) -> Option<TokenPair> {
        self.saved.lock().ok().and_then(|saved| saved.last().cloned())
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saved.lock().map(|saved| saved.len()).unwrap_or(0)
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn save(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        if self.fail {
            return Err("credential store unavailable".into());
        }
        self.saved
            .lock()
            .map_err(|_| StoreError::from("credential store lock poisoned"))?
            .push(tokens.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_in_memory_store_keeps_latest() {
        let store = InMemoryCredentialStore::new();
        store.save(&TokenPair::new("a1", "r1")).await.unwrap();
        store.save(&TokenPair::new("a2", "r2")).await.unwrap();

        assert_eq!(store.save_count(), 2);
        let last = store.last_saved().unwrap();
        assert_eq!(last.access_token().expose_secret(), "a2");
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = InMemoryCredentialStore::failing();
        assert!(store.save(&TokenPair::new("a", "r")).await.is_err());
        assert_eq!(store.save_count(), 0);
        assert!(NoopCredentialStore.save(&TokenPair::new("a", "r")).await.is_ok());
    }
}
