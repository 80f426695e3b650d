use std::path::PathBuf;

use crate::error::Error;
use crate::state::DEFAULT_LOGIN_DAY;

/// Default name of the token cookie.
pub const TOKEN_KEY: &str = "authorized-token";
/// Default name of the tabs flag cookie.
pub const MULTIPLE_TABS_KEY: &str = "multiple-tabs";
/// Default key of the durable user record.
pub const USER_KEY: &str = "user-info";

/// Session persistence and UI settings.
///
/// Use [`from_env()`](SessionConfig::from_env) for convention-based setup,
/// or [`default()`](SessionConfig::default) with `with_*` methods for full control.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    pub(crate) token_key: String,
    pub(crate) multiple_tabs_key: String,
    pub(crate) user_key: String,
    pub(crate) storage_dir: Option<PathBuf>,
    pub(crate) login_day: i64,
    pub(crate) remember_me: bool,
    pub(crate) login_route: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_key: TOKEN_KEY.into(),
            multiple_tabs_key: MULTIPLE_TABS_KEY.into(),
            user_key: USER_KEY.into(),
            storage_dir: None,
            login_day: DEFAULT_LOGIN_DAY,
            remember_me: false,
            login_route: "/login".into(),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `ADMIN_SESSION_DIR`: persist cookies and the user record under this directory
    /// - `ADMIN_LOGIN_DAY`: remember-me lifetime in days (default 7)
    /// - `ADMIN_REMEMBER_ME`: `"1"` or `"true"` to keep the tabs cookie for `login_day` days
    /// - `ADMIN_LOGIN_ROUTE`: route pushed on logout (default `/login`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ADMIN_LOGIN_DAY` is not a positive integer.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("ADMIN_SESSION_DIR") {
            config = config.with_storage_dir(dir);
        }
        if let Ok(days) = std::env::var("ADMIN_LOGIN_DAY") {
            let days: i64 = days
                .trim()
                .parse()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| Error::Config(format!("ADMIN_LOGIN_DAY: invalid value {days:?}")))?;
            config = config.with_login_day(days);
        }
        let remember = matches!(
            std::env::var("ADMIN_REMEMBER_ME").as_deref(),
            Ok("1") | Ok("true"),
        );
        if let Ok(route) = std::env::var("ADMIN_LOGIN_ROUTE") {
            config = config.with_login_route(route);
        }

        Ok(config.with_remember_me(remember))
    }

    /// Override the token cookie name.
    #[must_use]
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Override the tabs flag cookie name.
    #[must_use]
    pub fn with_multiple_tabs_key(mut self, key: impl Into<String>) -> Self {
        self.multiple_tabs_key = key.into();
        self
    }

    /// Override the durable record key.
    #[must_use]
    pub fn with_user_key(mut self, key: impl Into<String>) -> Self {
        self.user_key = key.into();
        self
    }

    /// Keep cookies and the durable record under `dir`.
    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Days a remembered tabs flag lives.
    #[must_use]
    pub fn with_login_day(mut self, days: i64) -> Self {
        self.login_day = days;
        self
    }

    /// Remember the login beyond the current process.
    #[must_use]
    pub fn with_remember_me(mut self, remember: bool) -> Self {
        self.remember_me = remember;
        self
    }

    /// Route pushed after logout.
    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Token cookie name.
    #[must_use]
    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    /// Tabs flag cookie name.
    #[must_use]
    pub fn multiple_tabs_key(&self) -> &str {
        &self.multiple_tabs_key
    }

    /// Durable record key.
    #[must_use]
    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// Directory for file-backed storage, if any.
    #[must_use]
    pub fn storage_dir(&self) -> Option<&std::path::Path> {
        self.storage_dir.as_deref()
    }

    /// Lifetime of a remembered tabs flag, in days.
    #[must_use]
    pub fn login_day(&self) -> i64 {
        self.login_day
    }

    /// Whether logins are remembered.
    #[must_use]
    pub fn remember_me(&self) -> bool {
        self.remember_me
    }

    /// Route pushed after logout.
    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }
}
