//! Local session state: login status and the notification list.
//!
//! Both stores are built once per application instance and handed to
//! consumers by `Arc`; nothing here is global.

pub mod notifications;
pub mod storage;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

pub use notifications::{NotificationStore, Refresh};
pub use storage::{FileTokenStorage, MemoryTokenStorage, StorageError, TokenStorage};

/// Storage key of the session token.
pub const AUTH_TOKEN_KEY: &str = "authToken";
/// Storage key of the signed-in user's id.
pub const USER_ID_KEY: &str = "userId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "logged_in", rename_all = "snake_case")]
pub enum LoginState {
    /// Not checked yet, or there is no persisted-storage surface at all.
    Unknown,
    Known(bool),
}

impl LoginState {
    pub fn is_logged_in(self) -> bool {
        matches!(self, LoginState::Known(true))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no persisted storage available for the session token")]
    NoStorage,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Login status derived from the presence of a persisted token.
///
/// The token is never validated here. Writers go through
/// [`SessionStore::store_session`] and [`SessionStore::logout`] so that
/// subscribers hear about every change.
pub struct SessionStore {
    storage: Option<Arc<dyn TokenStorage>>,
    state: watch::Sender<LoginState>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(LoginState::Unknown);
        Self {
            storage: Some(storage),
            state,
        }
    }

    /// A store with nowhere to persist a token; stays `Unknown`.
    pub fn without_storage() -> Self {
        let (state, _) = watch::channel(LoginState::Unknown);
        Self {
            storage: None,
            state,
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let storage = self.storage.as_ref()?;
        match storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                log::warn!("reading `{key}` from session storage failed: {e}");
                None
            }
        }
    }

    /// Re-reads the persisted token and returns the resulting state.
    pub fn check(&self) -> LoginState {
        if self.storage.is_none() {
            return LoginState::Unknown;
        }
        let next = LoginState::Known(self.read(AUTH_TOKEN_KEY).is_some());
        self.state.send_if_modified(|current| {
            let changed = *current != next;
            *current = next;
            changed
        });
        next
    }

    /// Last state observed, without touching storage.
    pub fn status(&self) -> LoginState {
        *self.state.borrow()
    }

    pub fn is_logged_in(&self) -> bool {
        self.check().is_logged_in()
    }

    pub fn token(&self) -> Option<String> {
        self.read(AUTH_TOKEN_KEY)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.read(USER_ID_KEY).and_then(|raw| Uuid::parse_str(&raw).ok())
    }

    /// Persists a freshly issued token and announces `Known(true)`.
    pub fn store_session(&self, token: &str, user_id: Option<Uuid>) -> Result<(), SessionError> {
        let storage = self.storage.as_ref().ok_or(SessionError::NoStorage)?;
        storage.set(AUTH_TOKEN_KEY, token)?;
        match user_id {
            Some(id) => storage.set(USER_ID_KEY, &id.to_string())?,
            None => storage.remove(USER_ID_KEY)?,
        }
        self.state.send_replace(LoginState::Known(true));
        log::info!("session stored");
        Ok(())
    }

    /// Removes the token and announces `Known(false)`.
    pub fn logout(&self) -> Result<(), SessionError> {
        let storage = self.storage.as_ref().ok_or(SessionError::NoStorage)?;
        storage.remove(AUTH_TOKEN_KEY)?;
        storage.remove(USER_ID_KEY)?;
        self.state.send_replace(LoginState::Known(false));
        log::info!("session cleared");
        Ok(())
    }

    /// Fires whenever the token is written or cleared.
    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }
}
