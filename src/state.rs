use std::sync::Arc;

use tokio::sync::watch;

use crate::permission::{PermissionQuery, has_permission};
use crate::types::UserId;

/// Default lifetime of the remember-me tabs cookie.
pub const DEFAULT_LOGIN_DAY: i64 = 7;

/// Snapshot of the in-memory session cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub avatar: String,
    pub username: String,
    pub nickname: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub user_id: Option<UserId>,
    /// Keep the tabs cookie for `login_day` days instead of the browser session.
    pub is_remembered: bool,
    pub login_day: i64,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            avatar: String::new(),
            username: String::new(),
            nickname: String::new(),
            roles: Vec::new(),
            permissions: Vec::new(),
            user_id: None,
            is_remembered: false,
            login_day: DEFAULT_LOGIN_DAY,
        }
    }
}

/// Shared handle to the in-memory session cache.
///
/// Clones share the same state. Every mutation notifies receivers obtained
/// from [`subscribe`](Self::subscribe).
#[derive(Debug, Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<UserState>>,
}

impl SessionState {
    #[must_use]
    pub fn new(initial: UserState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn snapshot(&self) -> UserState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UserState> {
        self.tx.subscribe()
    }

    /// Applies `f` and notifies subscribers.
    pub fn update(&self, f: impl FnOnce(&mut UserState)) {
        self.tx.send_modify(f);
    }

    pub fn set_avatar(&self, avatar: impl Into<String>) {
        let avatar = avatar.into();
        self.update(|s| s.avatar = avatar);
    }

    pub fn set_username(&self, username: impl Into<String>) {
        let username = username.into();
        self.update(|s| s.username = username);
    }

    pub fn set_nickname(&self, nickname: impl Into<String>) {
        let nickname = nickname.into();
        self.update(|s| s.nickname = nickname);
    }

    pub fn set_roles(&self, roles: Vec<String>) {
        self.update(|s| s.roles = roles);
    }

    pub fn set_permissions(&self, permissions: Vec<String>) {
        self.update(|s| s.permissions = permissions);
    }

    pub fn set_user_id(&self, user_id: Option<UserId>) {
        self.update(|s| s.user_id = user_id);
    }

    pub fn set_remembered(&self, remembered: bool) {
        self.update(|s| s.is_remembered = remembered);
    }

    pub fn set_login_day(&self, days: i64) {
        self.update(|s| s.login_day = days);
    }

    #[must_use]
    pub fn is_remembered(&self) -> bool {
        self.tx.borrow().is_remembered
    }

    #[must_use]
    pub fn login_day(&self) -> i64 {
        self.tx.borrow().login_day
    }

    #[must_use]
    pub fn permissions(&self) -> Vec<String> {
        self.tx.borrow().permissions.clone()
    }

    /// Checks `required` against the cached permissions.
    #[must_use]
    pub fn has_permission<Q: PermissionQuery + ?Sized>(&self, required: &Q) -> bool {
        has_permission(required, &self.tx.borrow().permissions)
    }

    /// Resets identity fields on logout. Avatar, nickname and the
    /// remember-me settings are left as they are.
    pub(crate) fn clear_identity(&self) {
        self.update(|s| {
            s.username.clear();
            s.roles.clear();
            s.permissions.clear();
            s.user_id = None;
        });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(UserState::default())
    }
}
