use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::callback::AuthCallback;
use crate::token::{MemoryTokenStore, TokenStore};
use crate::ClientError;

enum TokenState {
    /// Storage has not been read since the session was created.
    Unloaded,
    Loaded(Option<SecretString>),
}

/// Login state shared between the application and the client.
///
/// The in-memory token is the single source of truth for "logged in"; the
/// [`TokenStore`] mirrors it so a restart picks the session back up. Clones
/// share the same state.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    state: Arc<RwLock<TokenState>>,
}

impl Session {
    pub fn new<S: TokenStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
            state: Arc::new(RwLock::new(TokenState::Unloaded)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryTokenStore::new())
    }

    /// Returns the cached token, reading storage on first use.
    pub fn token(&self) -> Option<SecretString> {
        {
            let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let TokenState::Loaded(token) = &*guard {
                return token.clone();
            }
        }

        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let TokenState::Loaded(token) = &*guard {
            return token.clone();
        }
        let loaded = match self.store.load() {
            Ok(token) => token.map(SecretString::new),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load stored session token");
                None
            }
        };
        *guard = TokenState::Loaded(loaded.clone());
        loaded
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Replaces the token. `None` (or a blank token) logs out.
    pub fn set_token(&self, token: Option<&str>) -> Result<(), ClientError> {
        match token.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => {
                self.store.save(token)?;
                self.replace(Some(SecretString::new(token.to_string())));
                tracing::info!("session token stored");
                Ok(())
            }
            None => self.clear(),
        }
    }

    /// Forgets the token in memory and in storage. Memory is cleared even if
    /// storage fails so the session never outlives a logout.
    pub fn clear(&self) -> Result<(), ClientError> {
        self.replace(None);
        tracing::info!("session token cleared");
        self.store.clear()
    }

    /// Stores the token carried by a post-login redirect and returns the
    /// redirect URL with the token removed.
    pub fn complete_login(&self, callback_url: &Url) -> Result<Url, ClientError> {
        let callback = AuthCallback::parse(callback_url)?;
        self.set_token(Some(callback.token.expose_secret().as_str()))?;
        Ok(callback.clean_url)
    }

    fn replace(&self, token: Option<SecretString>) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = TokenState::Loaded(token);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            TokenState::Unloaded => "<unloaded>",
            TokenState::Loaded(Some(_)) => "<redacted>",
            TokenState::Loaded(None) => "<none>",
        };
        f.debug_struct("Session").field("token", &token).finish()
    }
}
