use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::Error;
use crate::state::{SessionState, UserState};
use crate::storage::cookies::{cookie_for_days, expiring_cookie};
use crate::storage::{CookieStore, FileStorage, LocalStorage, MemoryStorage};
use crate::types::{Expires, SessionData, SessionRecord, TokenCookie, UserRecord};

const COOKIE_FILE: &str = "cookies.txt";

/// Formats an `Authorization` header value for `token`.
#[must_use]
pub fn format_token(token: &str) -> String {
    format!("Bearer {token}")
}

/// Durable home of the session: a token cookie plus a local user record.
///
/// The cookie carries the expiring token and wins on read; the local record
/// carries display and authorization fields and survives cookie expiry.
/// Clones share the same backends and [`SessionState`].
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    cookies: CookieStore,
    local: Box<dyn LocalStorage>,
    state: SessionState,
    token_key: String,
    multiple_tabs_key: String,
    user_key: String,
}

impl CredentialStore {
    /// Builds a store over the given backends and rehydrates [`SessionState`]
    /// from the durable record.
    pub fn new(cookies: CookieStore, local: impl LocalStorage, config: &SessionConfig) -> Self {
        let inner = Inner {
            cookies,
            local: Box::new(local),
            state: SessionState::default(),
            token_key: config.token_key.clone(),
            multiple_tabs_key: config.multiple_tabs_key.clone(),
            user_key: config.user_key.clone(),
        };

        let user = inner.read_user_record().unwrap_or_default();
        inner.state.update(|s| {
            *s = UserState {
                avatar: user.avatar,
                username: user.username,
                nickname: user.nickname,
                roles: user.roles,
                permissions: user.permissions,
                user_id: user.user_id,
                is_remembered: config.remember_me,
                login_day: config.login_day,
            };
        });

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Store that forgets everything when the process exits.
    #[must_use]
    pub fn in_memory(config: &SessionConfig) -> Self {
        Self::new(CookieStore::in_memory(), MemoryStorage::new(), config)
    }

    /// File-backed store under `config.storage_dir()`, or in-memory if unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if an existing cookie file cannot be read.
    pub fn from_config(config: &SessionConfig) -> Result<Self, Error> {
        match config.storage_dir() {
            Some(dir) => {
                let cookies = CookieStore::open(dir.join(COOKIE_FILE))?;
                Ok(Self::new(cookies, FileStorage::new(dir), config))
            }
            None => Ok(Self::in_memory(config)),
        }
    }

    /// In-memory cache shared with the UI layer.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.inner.state
    }

    /// Current session, preferring the token cookie over the durable record.
    ///
    /// Without a live cookie the durable record alone is returned, with an
    /// empty access token. Unparsable entries count as absent.
    #[must_use]
    pub fn get(&self) -> Option<SessionRecord> {
        let user = self.inner.read_user_record();
        match self.inner.read_token_cookie() {
            Some(token) => {
                let user = user.unwrap_or_default();
                Some(SessionRecord {
                    access_token: token.access_token,
                    refresh_token: token.refresh_token,
                    expires_at: token.expires,
                    username: user.username,
                    nickname: user.nickname,
                    avatar: user.avatar,
                    roles: user.roles,
                    permissions: user.permissions,
                    user_id: token.user_id.or(user.user_id),
                })
            }
            None => user.map(|user| SessionRecord {
                access_token: String::new(),
                refresh_token: user.refresh_token,
                expires_at: user.expires,
                username: user.username,
                nickname: user.nickname,
                avatar: user.avatar,
                roles: user.roles,
                permissions: user.permissions,
                user_id: user.user_id,
            }),
        }
    }

    /// Persists `data` to both locations and mirrors it into [`SessionState`].
    ///
    /// A full record (see [`SessionData::is_full`]) replaces the display
    /// fields; a partial one re-writes the stored display fields unchanged.
    ///
    /// The durable record is written first and put back if the cookies cannot
    /// be stored, so a failed `set` leaves the previous session in place.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the remembered login day is out of range
    /// - [`Error::Storage`] if a backend write fails
    pub fn set(&self, data: SessionData) -> Result<(), Error> {
        let inner = &self.inner;
        let is_full = data.is_full();
        let expires = data
            .expires
            .map(Expires::as_millis)
            .filter(|ms| *ms > 0)
            .unwrap_or(0);
        let refresh_token = data.refresh_token.unwrap_or_default();

        let token = TokenCookie {
            access_token: data.access_token,
            expires,
            refresh_token: refresh_token.clone(),
            user_id: data.user_id,
        };
        let token_json = serde_json::to_string(&token)
            .map_err(|e| Error::Storage(format!("token cookie: {e}")))?;
        let tabs_ttl = inner
            .state
            .is_remembered()
            .then(|| inner.state.login_day());
        let cookies = [
            expiring_cookie(
                &inner.token_key,
                token_json,
                Expires::from_millis(expires).instant(),
            ),
            cookie_for_days(&inner.multiple_tabs_key, "true".into(), tabs_ttl)?,
        ];

        let previous = inner.local.get_item(&inner.user_key).ok().flatten();
        let user = if is_full {
            UserRecord {
                refresh_token,
                expires,
                avatar: data.avatar.unwrap_or_default(),
                username: data.username.unwrap_or_default(),
                nickname: data.nickname.unwrap_or_default(),
                roles: data.roles.unwrap_or_default(),
                permissions: data.permissions.unwrap_or_default(),
                user_id: data.user_id,
            }
        } else {
            let existing = inner.read_user_record().unwrap_or_default();
            UserRecord {
                refresh_token,
                expires,
                ..existing
            }
        };
        inner.write_user_record(&user)?;

        if let Err(e) = inner.cookies.set_all(cookies) {
            inner.restore_user_record(previous.as_deref());
            return Err(e);
        }

        inner.state.update(|s| {
            s.avatar = user.avatar;
            s.username = user.username;
            s.nickname = user.nickname;
            s.roles = user.roles;
            s.permissions = user.permissions;
            s.user_id = user.user_id;
        });

        tracing::debug!(full = is_full, expires, "session stored");
        Ok(())
    }

    /// Deletes the token cookie, the tabs cookie and the durable record.
    ///
    /// [`SessionState`] is left untouched; clearing it is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a backend delete fails.
    pub fn remove(&self) -> Result<(), Error> {
        let inner = &self.inner;
        inner.cookies.remove(&inner.token_key)?;
        inner.cookies.remove(&inner.multiple_tabs_key)?;
        inner.local.remove_item(&inner.user_key)?;
        tracing::debug!("session removed");
        Ok(())
    }

    /// Bearer token of the live session, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read_token_cookie()
            .map(|t| t.access_token)
            .filter(|t| !t.is_empty())
    }

    /// `true` while the token cookie holds a non-empty access token.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.access_token().is_some()
    }

    /// `true` while the tabs flag cookie is present.
    #[must_use]
    pub fn has_tabs_flag(&self) -> bool {
        self.inner.cookies.get(&self.inner.multiple_tabs_key).is_some()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("token_key", &self.inner.token_key)
            .field("user_key", &self.inner.user_key)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn read_token_cookie(&self) -> Option<TokenCookie> {
        let raw = self.cookies.get(&self.token_key)?;
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, cookie = %self.token_key, "ignoring unparsable token cookie");
                None
            }
        }
    }

    fn read_user_record(&self) -> Option<UserRecord> {
        let raw = match self.local.get_item(&self.user_key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, key = %self.user_key, "durable record unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.user_key, "ignoring unparsable durable record");
                None
            }
        }
    }

    fn write_user_record(&self, user: &UserRecord) -> Result<(), Error> {
        let json = serde_json::to_string(user)
            .map_err(|e| Error::Storage(format!("user record: {e}")))?;
        self.local.set_item(&self.user_key, &json)
    }

    fn restore_user_record(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(raw) => self.local.set_item(&self.user_key, raw),
            None => self.local.remove_item(&self.user_key),
        };
        if let Err(e) = restored {
            tracing::warn!(error = %e, key = %self.user_key, "durable record not restored");
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::types::UserId;

    fn store() -> CredentialStore {
        CredentialStore::in_memory(&SessionConfig::default())
    }

    fn full(token: &str) -> SessionData {
        SessionData::new(token)
            .with_username("alice")
            .with_nickname("Al")
            .with_roles(vec!["admin".into()])
            .with_permissions(vec!["system:user:list".into()])
            .with_user_id(UserId(1))
    }

    #[test]
    fn format_token_prefixes_bearer() {
        assert_eq!(format_token("abc"), "Bearer abc");
        assert_eq!(format_token(""), "Bearer ");
    }

    #[test]
    fn empty_store_has_no_session() {
        let store = store();
        assert_eq!(store.get(), None);
        assert!(!store.is_active());
        assert!(!store.has_tabs_flag());
    }

    #[test]
    fn set_then_get_roundtrip() {
        let store = store();
        store.set(full("T")).unwrap();

        let record = store.get().unwrap();
        assert_eq!(record.access_token, "T");
        assert_eq!(record.roles, vec!["admin".to_string()]);
        assert_eq!(record.permissions, vec!["system:user:list".to_string()]);
        assert_eq!(record.user_id, Some(UserId(1)));
        assert_eq!(record.expires_at, 0);
        assert!(store.is_active());
        assert!(store.has_tabs_flag());
    }

    #[test]
    fn full_set_updates_state() {
        let store = store();
        store.set(full("T")).unwrap();
        let snap = store.state().snapshot();
        assert_eq!(snap.username, "alice");
        assert_eq!(snap.nickname, "Al");
        assert_eq!(snap.avatar, "");
        assert_eq!(snap.user_id, Some(UserId(1)));
    }

    #[test]
    fn partial_update_preserves_display_fields() {
        let store = store();
        store
            .set(
                SessionData::new("T1")
                    .with_username("u")
                    .with_roles(vec!["r".into()]),
            )
            .unwrap();
        store.set(SessionData::new("T2")).unwrap();

        let record = store.get().unwrap();
        assert_eq!(record.access_token, "T2");
        assert_eq!(record.username, "u");
        assert_eq!(record.roles, vec!["r".to_string()]);
        assert_eq!(store.state().snapshot().username, "u");
    }

    #[test]
    fn partial_update_keeps_user_id_from_durable_record() {
        let store = store();
        store.set(full("T1")).unwrap();
        store
            .set(SessionData::new("T2").with_refresh_token("R2"))
            .unwrap();
        let record = store.get().unwrap();
        assert_eq!(record.user_id, Some(UserId(1)));
        assert_eq!(record.refresh_token, "R2");
    }

    #[test]
    fn remove_then_get_is_none() {
        let store = store();
        store.set(full("T")).unwrap();
        store.remove().unwrap();
        assert_eq!(store.get(), None);
        assert!(!store.has_tabs_flag());
        // state is the caller's to clear
        assert_eq!(store.state().snapshot().username, "alice");
    }

    #[test]
    fn expired_cookie_falls_back_to_durable_record() {
        let store = store();
        let past = OffsetDateTime::now_utc() - Duration::hours(1);
        store
            .set(full("T").with_expires(Expires::at(past)))
            .unwrap();

        let record = store.get().unwrap();
        assert!(!record.is_active());
        assert_eq!(record.username, "alice");
        assert_eq!(record.expires_at, Expires::at(past).as_millis());
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn future_expiry_keeps_cookie() {
        let store = store();
        let future = OffsetDateTime::now_utc() + Duration::days(1);
        store
            .set(full("T").with_expires(Expires::at(future)))
            .unwrap();
        assert_eq!(store.access_token().as_deref(), Some("T"));
    }

    #[test]
    fn unparsable_cookie_counts_as_absent() {
        let cookies = CookieStore::in_memory();
        cookies
            .set(expiring_cookie("authorized-token", "not json".into(), None))
            .unwrap();
        let store = CredentialStore::new(cookies, MemoryStorage::new(), &SessionConfig::default());
        assert_eq!(store.get(), None);
        assert!(!store.is_active());
    }

    #[test]
    fn state_is_rehydrated_from_durable_record() {
        let local = MemoryStorage::new();
        local
            .set_item(
                "user-info",
                r#"{"username":"bob","roles":["ops"],"permissions":["*:*:*"],"userId":9}"#,
            )
            .unwrap();
        let config = SessionConfig::default().with_remember_me(true);
        let store = CredentialStore::new(CookieStore::in_memory(), local, &config);

        let snap = store.state().snapshot();
        assert_eq!(snap.username, "bob");
        assert_eq!(snap.user_id, Some(UserId(9)));
        assert!(snap.is_remembered);
        assert!(store.state().has_permission("anything:at:all"));
    }

    #[test]
    fn file_backed_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().with_storage_dir(dir.path());
        let future = OffsetDateTime::now_utc() + Duration::days(1);

        let store = CredentialStore::from_config(&config).unwrap();
        store
            .set(full("T").with_expires(Expires::at(future)))
            .unwrap();
        drop(store);

        let reopened = CredentialStore::from_config(&config).unwrap();
        let record = reopened.get().unwrap();
        assert_eq!(record.access_token, "T");
        assert_eq!(record.username, "alice");
        assert_eq!(reopened.state().snapshot().username, "alice");
    }

    #[test]
    fn session_scoped_token_does_not_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().with_storage_dir(dir.path());

        CredentialStore::from_config(&config)
            .unwrap()
            .set(full("T"))
            .unwrap();

        let reopened = CredentialStore::from_config(&config).unwrap();
        let record = reopened.get().unwrap();
        assert!(!record.is_active());
        assert_eq!(record.username, "alice");
    }

    #[test]
    fn remembered_tabs_flag_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default()
            .with_storage_dir(dir.path())
            .with_remember_me(true);

        CredentialStore::from_config(&config)
            .unwrap()
            .set(full("T"))
            .unwrap();

        assert!(CredentialStore::from_config(&config).unwrap().has_tabs_flag());
    }

    #[test]
    fn tabs_flag_is_session_scoped_unless_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default()
            .with_storage_dir(dir.path())
            .with_remember_me(false);

        let store = CredentialStore::from_config(&config).unwrap();
        store.set(full("T")).unwrap();
        assert!(store.has_tabs_flag());
        drop(store);

        assert!(!CredentialStore::from_config(&config).unwrap().has_tabs_flag());
    }

    #[test]
    fn partial_set_on_empty_store_writes_blank_display_fields() {
        let store = store();
        store
            .set(SessionData::new("T").with_refresh_token("R"))
            .unwrap();

        let record = store.get().unwrap();
        assert_eq!(record.access_token, "T");
        assert_eq!(record.refresh_token, "R");
        assert_eq!(record.username, "");
        assert_eq!(record.nickname, "");
        assert_eq!(record.avatar, "");
        assert!(record.roles.is_empty());
        assert!(record.permissions.is_empty());
        assert_eq!(record.user_id, None);
    }

    #[test]
    fn out_of_range_login_day_is_config_error() {
        let config = SessionConfig::default()
            .with_login_day(1_000_000_000)
            .with_remember_me(true);
        let store = CredentialStore::in_memory(&config);

        let err = store.set(full("T")).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
        assert_eq!(store.get(), None);
        assert!(!store.is_active());
    }

    struct ReadOnlyStorage;

    impl LocalStorage for ReadOnlyStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, Error> {
            Ok(None)
        }

        fn set_item(&self, key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::Storage(format!("{key}: read-only")))
        }

        fn remove_item(&self, _key: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn failed_record_write_leaves_no_token() {
        let store = CredentialStore::new(
            CookieStore::in_memory(),
            ReadOnlyStorage,
            &SessionConfig::default(),
        );

        assert!(matches!(store.set(full("NEW")), Err(Error::Storage(_))));
        assert_eq!(store.access_token(), None);
        assert!(!store.has_tabs_flag());
        assert_eq!(store.state().snapshot().username, "");
    }

    #[test]
    fn failed_cookie_write_restores_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = CookieStore::open(dir.path().join("jar").join("cookies.txt")).unwrap();
        let store = CredentialStore::new(cookies, MemoryStorage::new(), &SessionConfig::default());
        store.set(full("OLD")).unwrap();

        // A file where the jar's directory should be makes the write-back fail.
        std::fs::remove_dir_all(dir.path().join("jar")).unwrap();
        std::fs::write(dir.path().join("jar"), "").unwrap();

        let err = store
            .set(full("NEW").with_username("bob"))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "{err}");

        let record = store.get().unwrap();
        assert_eq!(record.access_token, "OLD");
        assert_eq!(record.username, "alice");
        assert_eq!(store.state().snapshot().username, "alice");
    }
}
