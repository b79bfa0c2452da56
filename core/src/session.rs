//! The authenticated identity and its lifecycle.
//!
//! # Design
//! `SessionStore` is the single authority for "is a user logged in". The
//! token and the user record live together in one `Session` value, so the
//! store is either fully populated or empty and never holds one half. The
//! in-memory value is only ever replaced wholesale.
//!
//! Durable storage is written before the in-memory swap on login and cleared
//! together with it on logout, so a restart rehydrates the same state the
//! application last observed.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::storage::{SessionStorage, StorageError, TOKEN_KEY, USER_KEY};

/// Role name of the platform operator, who belongs to no tenant.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// The logged-in user's profile as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Tenant the user belongs to; `None` for platform operators.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl User {
    pub fn is_super_admin(&self) -> bool {
        self.role == SUPER_ADMIN_ROLE
    }
}

/// A bearer token together with the user it was issued to.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user: User,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Holds the current session and mirrors it to durable storage.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    current: RwLock<Option<Session>>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionStore {
    /// An empty store over `storage`. Nothing is read from storage.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            storage,
            current: RwLock::new(None),
            state_tx,
        }
    }

    /// Rehydrate from `storage`.
    ///
    /// The store starts populated only if both entries are present and the
    /// user record parses. Any other combination is treated as no session,
    /// and stray entries are removed so storage matches memory.
    pub fn initialize(storage: Arc<dyn SessionStorage>) -> Self {
        let store = Self::new(storage);
        match store.rehydrate() {
            Ok(Some(session)) => {
                info!(user = %session.user.email, "session restored");
                store.replace(Some(session));
            }
            Ok(None) => {
                debug!("no persisted session");
                store.clear_storage();
            }
            Err(e) => {
                warn!(error = %e, "could not read persisted session");
                store.clear_storage();
            }
        }
        store
    }

    fn rehydrate(&self) -> Result<Option<Session>, StorageError> {
        let token = self.storage.get(TOKEN_KEY)?;
        let user = self.storage.get(USER_KEY)?;
        let (Some(token), Some(user)) = (token, user) else {
            return Ok(None);
        };
        if token.is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<User>(&user) {
            Ok(user) => Ok(Some(Session::new(token, user))),
            Err(e) => {
                warn!(error = %e, "persisted user record is unreadable");
                Ok(None)
            }
        }
    }

    /// Persist `token` and `user`, then make them the current session.
    ///
    /// On a storage failure both entries are removed again and the
    /// in-memory session is left as it was.
    pub fn establish(&self, token: String, user: User) -> Result<(), StorageError> {
        let user_json =
            serde_json::to_string(&user).map_err(|e| StorageError::Serialize(e.to_string()))?;
        let persisted = self
            .storage
            .set(TOKEN_KEY, &token)
            .and_then(|()| self.storage.set(USER_KEY, &user_json));
        if let Err(e) = persisted {
            self.clear_storage();
            return Err(e);
        }
        info!(user = %user.email, "session established");
        self.replace(Some(Session::new(token, user)));
        Ok(())
    }

    /// Drop the session from memory and storage. Safe to call repeatedly.
    pub fn clear(&self) {
        self.clear_storage();
        if self.replace(None).is_some() {
            info!("session cleared");
        }
    }

    fn clear_storage(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "could not remove persisted session entry");
            }
        }
    }

    fn replace(&self, next: Option<Session>) -> Option<Session> {
        let state = if next.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        };
        // Publish under the write guard so watchers and `state()` agree.
        let mut current = self.current.write();
        let previous = std::mem::replace(&mut *current, next);
        self.state_tx.send_replace(state);
        drop(current);
        previous
    }

    pub fn state(&self) -> SessionState {
        if self.current.read().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.token.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.read().as_ref().map(|s| s.user.clone())
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            name: "Ana Souza".to_string(),
            email: "ana@acme.test".to_string(),
            role: "admin".to_string(),
            tenant_id: Some("t-1".to_string()),
        }
    }

    fn storage_with(token: Option<&str>, user: Option<&str>) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        if let Some(token) = token {
            storage.set(TOKEN_KEY, token).unwrap();
        }
        if let Some(user) = user {
            storage.set(USER_KEY, user).unwrap();
        }
        storage
    }

    #[test]
    fn initialize_restores_complete_session() {
        let json = serde_json::to_string(&user()).unwrap();
        let store = SessionStore::initialize(storage_with(Some("T"), Some(&json)));
        assert_eq!(store.state(), SessionState::Authenticated);
        assert_eq!(store.current_user(), Some(user()));
        assert_eq!(store.token().as_deref(), Some("T"));
    }

    #[test]
    fn initialize_with_only_token_starts_empty_and_cleans_up() {
        let storage = storage_with(Some("T"), None);
        let store = SessionStore::initialize(storage.clone());
        assert_eq!(store.state(), SessionState::Unauthenticated);
        assert!(storage.is_empty());
    }

    #[test]
    fn initialize_with_only_user_starts_empty() {
        let json = serde_json::to_string(&user()).unwrap();
        let storage = storage_with(None, Some(&json));
        let store = SessionStore::initialize(storage.clone());
        assert_eq!(store.state(), SessionState::Unauthenticated);
        assert!(store.current_user().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn initialize_with_corrupt_user_starts_empty() {
        let storage = storage_with(Some("T"), Some("{not json"));
        let store = SessionStore::initialize(storage.clone());
        assert_eq!(store.state(), SessionState::Unauthenticated);
        assert!(store.token().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn establish_persists_both_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::initialize(storage.clone());
        store.establish("T".to_string(), user()).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("T"));
        let saved: User = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(saved, user());
    }

    #[test]
    fn clear_twice_leaves_storage_empty() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.establish("T".to_string(), user()).unwrap();

        store.clear();
        assert!(storage.is_empty());
        assert_eq!(store.state(), SessionState::Unauthenticated);

        store.clear();
        assert!(storage.is_empty());
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn subscribers_see_transitions() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), SessionState::Unauthenticated);

        store.establish("T".to_string(), user()).unwrap();
        assert_eq!(*rx.borrow(), SessionState::Authenticated);

        store.clear();
        assert_eq!(*rx.borrow(), SessionState::Unauthenticated);
    }

    #[test]
    fn watchers_agree_with_state_under_contention() {
        let store = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let rx = store.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if i % 2 == 0 {
                            store.establish("T".to_string(), user()).unwrap();
                        } else {
                            store.clear();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*rx.borrow(), store.state());
    }

    #[test]
    fn debug_redacts_token() {
        let session = Session::new("very-secret", user());
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("ana@acme.test"));
    }

    #[test]
    fn super_admin_has_no_tenant() {
        let admin: User = serde_json::from_str(
            r#"{"id":"1","name":"Root","email":"root@platform.test","role":"super_admin","tenant_id":null}"#,
        )
        .unwrap();
        assert!(admin.is_super_admin());
        assert!(admin.tenant_id.is_none());
        assert!(!user().is_super_admin());
    }
}
