//! Login, logout and refresh orchestration.
//!
//! A session moves `Anonymous → LoggingIn → Authenticated` on login and
//! `Authenticated → LoggingOut → Anonymous` on logout. The intermediate states
//! only describe ordering inside one call; nothing about them is persisted.
//!
//! Overlapping [`SessionManager::login`] calls are not serialized: each one
//! clears the store before it starts, so the last one to commit wins.

use std::sync::Arc;

use crate::api::{
    AdminApi, Credentials, LoginResponse, RefreshRequest, RefreshResponse, RouteQuery,
    RoutesResponse,
};
use crate::credential::{CredentialStore, format_token};
use crate::error::Error;
use crate::state::SessionState;
use crate::types::{SessionData, SessionRecord};

const LOGIN_SUCCESS: i64 = 200;
const PROFILE_SUCCESS: i64 = 0;

/// Consumer-provided UI collaborators driven on logout.
///
/// # Example
///
/// ```rust,ignore
/// impl Navigator for AppShell {
///     fn reset_tags(&self) { self.tabs.replace_with_defaults(); }
///     fn reset_router(&self) { self.router.drop_dynamic_routes(); }
///     fn push(&self, path: &str) { self.router.navigate(path); }
/// }
/// ```
pub trait Navigator: Send + Sync + 'static {
    /// Restore the open tabs/pages to their default set.
    fn reset_tags(&self);

    /// Drop routes added from the backend route table.
    fn reset_router(&self);

    fn push(&self, path: &str);
}

/// Navigator that does nothing, for headless clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn reset_tags(&self) {}

    fn reset_router(&self) {}

    fn push(&self, _path: &str) {}
}

/// Result of a successful login.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoginOutcome {
    /// Login endpoint response, as received.
    pub response: LoginResponse,
    /// Session as committed to the credential store.
    pub session: SessionRecord,
}

/// Drives the session lifecycle against an [`AdminApi`].
pub struct SessionManager<A, N = NoopNavigator> {
    api: Arc<A>,
    store: CredentialStore,
    navigator: Arc<N>,
    login_route: String,
}

// Manual Clone: avoid derive adding `A: Clone, N: Clone` bounds.
impl<A, N> Clone for SessionManager<A, N> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            store: self.store.clone(),
            navigator: self.navigator.clone(),
            login_route: self.login_route.clone(),
        }
    }
}

impl<A: AdminApi> SessionManager<A> {
    #[must_use]
    pub fn new(api: A, store: CredentialStore) -> Self {
        Self::with_navigator(api, store, NoopNavigator)
    }
}

impl<A: AdminApi, N: Navigator> SessionManager<A, N> {
    #[must_use]
    pub fn with_navigator(api: A, store: CredentialStore, navigator: N) -> Self {
        Self {
            api: Arc::new(api),
            store,
            navigator: Arc::new(navigator),
            login_route: "/login".into(),
        }
    }

    /// Route pushed after logout (default `/login`).
    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        self.store.state()
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Logs in and commits the new session.
    ///
    /// Any existing session is removed first, so a failed attempt always
    /// leaves the store empty. The freshly issued token is attached to the
    /// profile request explicitly because it is not stored yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] / [`Error::Http`] if the login call fails
    /// - [`Error::Login`] if the login code is not `200` or no token came back
    /// - [`Error::ProfileFetch`] if the profile call fails or its code is not `0`
    /// - [`Error::Storage`] if the session cannot be persisted
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, Error> {
        self.store.remove()?;

        let response = self.api.login(credentials).await?;
        if !response.code.is_number(LOGIN_SUCCESS) {
            let msg = response.msg.clone().unwrap_or_else(|| "login failed".into());
            tracing::warn!(code = %response.code, msg = %msg, "login rejected");
            return Err(Error::Login(msg));
        }
        let token = response
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Login("login response carried no token".into()))?;

        let authorization = format_token(&token);
        let info = self
            .api
            .get_user_info(Some(&authorization))
            .await
            .map_err(|e| Error::ProfileFetch {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        if !info.code.is(PROFILE_SUCCESS) {
            let msg = info
                .msg
                .unwrap_or_else(|| "failed to fetch user info".into());
            tracing::warn!(code = %info.code, msg = %msg, "user info rejected");
            return Err(Error::profile(msg));
        }
        let data = info
            .data
            .ok_or_else(|| Error::profile("user info response carried no data"))?;

        let user = data.user;
        let mut session = SessionData::new(token)
            .with_refresh_token("")
            .with_username(user.user_name)
            .with_nickname(user.nick_name)
            .with_avatar(user.avatar.unwrap_or_default())
            .with_permissions(data.permissions);
        if let Some(roles) = data.roles {
            session = session.with_roles(roles);
        }
        if let Some(user_id) = user.user_id {
            session = session.with_user_id(user_id);
        }
        self.store.set(session)?;

        let session = self.store.get().unwrap_or_default();
        tracing::info!(username = %session.username, user_id = ?session.user_id, "login successful");

        Ok(LoginOutcome { response, session })
    }

    /// Ends the session locally. No network call is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the stored session cannot be deleted. The
    /// in-memory state is cleared regardless.
    pub fn logout(&self) -> Result<(), Error> {
        self.state().clear_identity();
        let removed = self.store.remove();

        self.navigator.reset_tags();
        self.navigator.reset_router();
        self.navigator.push(&self.login_route);

        tracing::info!("logged out");
        removed
    }

    /// Exchanges a refresh token and stores the new token fields.
    ///
    /// The stored display fields are kept (the response is a partial record).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Refresh`] if the call fails or the response is empty,
    /// or [`Error::Storage`] if the new token cannot be persisted.
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshResponse, Error> {
        let response = self
            .api
            .refresh_token(request)
            .await
            .map_err(|e| Error::Refresh {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?
            .ok_or_else(|| Error::refresh("empty refresh response"))?;

        let data = response
            .data
            .clone()
            .ok_or_else(|| Error::refresh("refresh response carried no data"))?;
        self.store.set(data)?;

        tracing::info!("access token refreshed");
        Ok(response)
    }

    /// Fetches the dynamic route table.
    ///
    /// # Errors
    ///
    /// Propagates the transport error from [`AdminApi::get_async_routes`].
    pub async fn routes(&self, query: &RouteQuery) -> Result<RoutesResponse, Error> {
        self.api.get_async_routes(query).await
    }
}
