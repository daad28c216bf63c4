use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{MemoryStorage, Session, Storage, StoreError, Token, TokenPair};
use crate::models::User;

/// Storage key of the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key of the logged-in user
pub const USER_KEY: &str = "user";

/// Single source of truth for session credentials.
///
/// Every read goes to the backing [`Storage`]; nothing is cached here, so
/// two stores over the same backend always agree. Writers are serialized so
/// a [`session`](Self::session) snapshot never observes half of a token pair
/// update.
pub struct TokenStore {
    storage: Box<dyn Storage>,
    write_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Load persisted state at process start.
    ///
    /// An access token found without a refresh token is dropped, since it
    /// could never be renewed.
    pub fn init(&self) -> Result<Session, StoreError> {
        let _guard = self.lock();
        let session = self.snapshot()?;
        if session.is_consistent() {
            debug!(logged_in = session.access_token.is_some(), "Session loaded");
            return Ok(session);
        }
        warn!("Discarding stored access token that has no refresh token");
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        Ok(Session {
            access_token: None,
            ..session
        })
    }

    pub fn get_access(&self) -> Result<Option<Token>, StoreError> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn get_refresh(&self) -> Result<Option<Token>, StoreError> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn get_user(&self) -> Result<Option<User>, StoreError> {
        self.read(USER_KEY)
    }

    /// Store or remove the access token. A token can only be stored while a
    /// refresh token is held.
    pub fn set_access(&self, token: Option<&Token>) -> Result<(), StoreError> {
        let _guard = self.lock();
        if token.is_some() && self.get_refresh()?.is_none() {
            return Err(StoreError::AccessWithoutRefresh);
        }
        self.write(ACCESS_TOKEN_KEY, token)
    }

    /// Store or remove the refresh token. Removing it also removes the
    /// access token.
    pub fn set_refresh(&self, token: Option<&Token>) -> Result<(), StoreError> {
        let _guard = self.lock();
        if token.is_none() {
            self.storage.remove(ACCESS_TOKEN_KEY)?;
        }
        self.write(REFRESH_TOKEN_KEY, token)
    }

    pub fn set_user(&self, user: Option<&User>) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.write(USER_KEY, user)
    }

    /// Replace both tokens. The refresh token is written first.
    pub fn set_tokens(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.write(REFRESH_TOKEN_KEY, Some(&tokens.refresh))?;
        self.write(ACCESS_TOKEN_KEY, Some(&tokens.access))
    }

    /// Replace both tokens, but only while `expected` is still the stored
    /// refresh token. Returns whether the write happened.
    pub fn replace_tokens(&self, expected: &Token, tokens: &TokenPair) -> Result<bool, StoreError> {
        let _guard = self.lock();
        if self.get_refresh()?.as_ref() != Some(expected) {
            return Ok(false);
        }
        self.write(REFRESH_TOKEN_KEY, Some(&tokens.refresh))?;
        self.write(ACCESS_TOKEN_KEY, Some(&tokens.access))?;
        Ok(true)
    }

    /// Clear the session, but only while `expected` is still the stored
    /// refresh token. Returns whether anything was removed.
    pub fn clear_if_current(&self, expected: &Token) -> Result<bool, StoreError> {
        let _guard = self.lock();
        if self.get_refresh()?.as_ref() != Some(expected) {
            return Ok(false);
        }
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        debug!("Session cleared");
        Ok(true)
    }

    pub fn session(&self) -> Result<Session, StoreError> {
        let _guard = self.lock();
        self.snapshot()
    }

    /// Remove all three persisted keys.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        debug!("Session cleared");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Result<Session, StoreError> {
        Ok(Session {
            user: self.read(USER_KEY)?,
            access_token: self.read(ACCESS_TOKEN_KEY)?,
            refresh_token: self.read(REFRESH_TOKEN_KEY)?,
        })
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                key: key.to_string(),
                source,
            })
    }

    // `None` removes the key; a null value is never written.
    fn write<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<(), StoreError> {
        match value {
            Some(value) => {
                let raw = serde_json::to_string(value).map_err(|source| {
                    StoreError::Serialization {
                        key: key.to_string(),
                        source,
                    }
                })?;
                self.storage.set(key, &raw)
            }
            None => self.storage.remove(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;

    /// Lets a test inspect the raw keys behind a store.
    struct Shared(Arc<MemoryStorage>);

    impl Storage for Shared {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.0.remove(key)
        }
    }

    fn token(value: &str) -> Token {
        let now = Utc::now();
        Token::new(value, now, now + Duration::minutes(30)).unwrap()
    }

    fn user() -> User {
        serde_json::from_str(r#"{"id":"u1","email":"scout@example.com"}"#).unwrap()
    }

    fn store() -> (Arc<MemoryStorage>, TokenStore) {
        let raw = Arc::new(MemoryStorage::new());
        (raw.clone(), TokenStore::new(Shared(raw)))
    }

    #[test]
    fn test_set_tokens_then_read_back() {
        let (_, store) = store();
        let pair = TokenPair {
            access: token("access-1"),
            refresh: token("refresh-1"),
        };
        store.set_tokens(&pair).unwrap();
        assert_eq!(store.get_access().unwrap(), Some(pair.access.clone()));
        assert_eq!(store.get_refresh().unwrap(), Some(pair.refresh.clone()));

        let session = store.session().unwrap();
        assert_eq!(session.token(), Some("access-1"));
        assert!(session.is_consistent());
    }

    #[test]
    fn test_none_removes_key_instead_of_writing_null() {
        let (raw, store) = store();
        store.set_user(Some(&user())).unwrap();
        assert!(raw.contains(USER_KEY));
        store.set_user(None).unwrap();
        assert!(!raw.contains(USER_KEY));
    }

    #[test]
    fn test_empty_token_value_is_still_a_credential() {
        let (raw, store) = store();
        store.set_refresh(Some(&token(""))).unwrap();
        assert!(raw.contains(REFRESH_TOKEN_KEY));
        assert_eq!(store.get_refresh().unwrap().map(|t| t.value().to_string()), Some(String::new()));
    }

    #[test]
    fn test_access_without_refresh_is_rejected() {
        let (raw, store) = store();
        assert!(matches!(
            store.set_access(Some(&token("a"))),
            Err(StoreError::AccessWithoutRefresh)
        ));
        assert!(!raw.contains(ACCESS_TOKEN_KEY));

        store.set_refresh(Some(&token("r"))).unwrap();
        store.set_access(Some(&token("a"))).unwrap();
        assert!(raw.contains(ACCESS_TOKEN_KEY));
    }

    #[test]
    fn test_removing_refresh_drops_access() {
        let (raw, store) = store();
        store
            .set_tokens(&TokenPair {
                access: token("a"),
                refresh: token("r"),
            })
            .unwrap();
        store.set_refresh(None).unwrap();
        assert!(!raw.contains(ACCESS_TOKEN_KEY));
        assert!(!raw.contains(REFRESH_TOKEN_KEY));
    }

    #[test]
    fn test_clear_removes_all_three_keys() {
        let (raw, store) = store();
        store.set_user(Some(&user())).unwrap();
        store
            .set_tokens(&TokenPair {
                access: token("a"),
                refresh: token("r"),
            })
            .unwrap();

        store.clear().unwrap();
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            assert!(!raw.contains(key), "{} still stored", key);
        }
        assert!(store.session().unwrap().is_empty());
    }

    #[test]
    fn test_replace_tokens_only_over_expected_refresh() {
        let (_, store) = store();
        let old = TokenPair {
            access: token("a1"),
            refresh: token("r1"),
        };
        let new = TokenPair {
            access: token("a2"),
            refresh: token("r2"),
        };
        store.set_tokens(&old).unwrap();

        assert!(store.replace_tokens(&old.refresh, &new).unwrap());
        assert_eq!(store.session().unwrap().token(), Some("a2"));

        // r1 is no longer current, so a late writer holding it is ignored.
        assert!(!store.replace_tokens(&old.refresh, &old).unwrap());
        assert_eq!(store.session().unwrap().token(), Some("a2"));

        store.clear().unwrap();
        assert!(!store.replace_tokens(&new.refresh, &new).unwrap());
        assert!(store.session().unwrap().is_empty());
    }

    #[test]
    fn test_clear_if_current_spares_newer_session() {
        let (_, store) = store();
        let old = token("r1");
        store
            .set_tokens(&TokenPair {
                access: token("a2"),
                refresh: token("r2"),
            })
            .unwrap();
        store.set_user(Some(&user())).unwrap();

        assert!(!store.clear_if_current(&old).unwrap());
        assert_eq!(store.session().unwrap().token(), Some("a2"));

        let current = store.get_refresh().unwrap().unwrap();
        assert!(store.clear_if_current(&current).unwrap());
        assert!(store.session().unwrap().is_empty());
    }

    #[test]
    fn test_init_repairs_orphaned_access_token() {
        let (raw, store) = store();
        raw.set(ACCESS_TOKEN_KEY, &serde_json::to_string(&token("a")).unwrap())
            .unwrap();

        let session = store.init().unwrap();
        assert!(session.access_token.is_none());
        assert!(!raw.contains(ACCESS_TOKEN_KEY));
    }

    #[test]
    fn test_malformed_value_is_reported() {
        let (raw, store) = store();
        raw.set(USER_KEY, "not json").unwrap();
        assert!(matches!(
            store.get_user(),
            Err(StoreError::Serialization { .. })
        ));
    }
}
