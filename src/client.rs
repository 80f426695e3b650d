use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{
    AdminApi, Credentials, LoginResponse, RefreshRequest, RefreshResponse, RouteQuery,
    RoutesResponse, UserInfoResponse,
};
use crate::credential::{CredentialStore, format_token};
use crate::error::Error;

/// Dashboard backend endpoints.
///
/// Required field (`base_url`) is a constructor parameter; endpoint paths
/// default to the dashboard's conventions and are joined onto it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) login_path: String,
    pub(crate) user_info_path: String,
    pub(crate) refresh_path: String,
    pub(crate) routes_path: String,
}

impl ClientConfig {
    /// Config with the default endpoint paths under `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            login_path: "/api/system/login".into(),
            user_info_path: "/api/system/getInfo".into(),
            refresh_path: "/api/refresh-token".into(),
            routes_path: "/system/getRouters".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `ADMIN_API_BASE_URL`: backend origin (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `ADMIN_LOGIN_PATH`, `ADMIN_USER_INFO_PATH`, `ADMIN_REFRESH_PATH`,
    ///   `ADMIN_ROUTES_PATH`: endpoint path overrides
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base = std::env::var("ADMIN_API_BASE_URL")
            .map_err(|_| Error::Config("ADMIN_API_BASE_URL is required".into()))?;
        let base_url: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("ADMIN_API_BASE_URL: {e}")))?;

        let mut config = Self::new(base_url);
        if let Ok(path) = std::env::var("ADMIN_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Ok(path) = std::env::var("ADMIN_USER_INFO_PATH") {
            config = config.with_user_info_path(path);
        }
        if let Ok(path) = std::env::var("ADMIN_REFRESH_PATH") {
            config = config.with_refresh_path(path);
        }
        if let Ok(path) = std::env::var("ADMIN_ROUTES_PATH") {
            config = config.with_routes_path(path);
        }
        Ok(config)
    }

    /// Override the login endpoint path.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Override the profile endpoint path.
    #[must_use]
    pub fn with_user_info_path(mut self, path: impl Into<String>) -> Self {
        self.user_info_path = path.into();
        self
    }

    /// Override the token refresh endpoint path.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override the route table endpoint path.
    #[must_use]
    pub fn with_routes_path(mut self, path: impl Into<String>) -> Self {
        self.routes_path = path.into();
        self
    }

    /// Backend origin all endpoint paths are joined to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("endpoint {path}: {e}")))
    }
}

/// HTTP implementation of [`AdminApi`].
///
/// With a [`CredentialStore`] attached, the stored bearer token is added to
/// every request except login and refresh. An explicit `Authorization`
/// passed to [`AdminApi::get_user_info`] always wins.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    credentials: Option<CredentialStore>,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            credentials: None,
        }
    }

    /// Use a custom HTTP client (for timeouts, proxies or connection pool reuse).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Attach stored credentials to outgoing requests.
    #[must_use]
    pub fn with_credentials(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
        explicit: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match explicit {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => match self.credentials.as_ref().and_then(CredentialStore::access_token) {
                Some(token) => builder.header(AUTHORIZATION, format_token(&token)),
                None => builder,
            },
        }
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Http { status, body })
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, Error> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(format!("{operation}: {e}")))
    }
}

impl AdminApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, Error> {
        let url = self.config.endpoint(&self.config.login_path)?;
        let response = self.http.post(url).json(credentials).send().await?;
        Self::decode(response, "login").await
    }

    async fn get_user_info(&self, authorization: Option<&str>) -> Result<UserInfoResponse, Error> {
        let url = self.config.endpoint(&self.config.user_info_path)?;
        let request = self.authorize(self.http.get(url), authorization);
        let response = request.send().await?;
        Self::decode(response, "getInfo").await
    }

    async fn refresh_token(&self, request: &RefreshRequest) -> Result<Option<RefreshResponse>, Error> {
        let url = self.config.endpoint(&self.config.refresh_path)?;
        let response = self.http.post(url).json(request).send().await?;
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        // An empty body and a JSON `null` both mean "no response".
        serde_json::from_slice::<Option<RefreshResponse>>(&bytes)
            .or_else(|e| {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    Ok(None)
                } else {
                    Err(e)
                }
            })
            .map_err(|e| Error::Decode(format!("refresh-token: {e}")))
    }

    async fn get_async_routes(&self, query: &RouteQuery) -> Result<RoutesResponse, Error> {
        let url = self.config.endpoint(&self.config.routes_path)?;
        let request = self.authorize(self.http.get(url).query(query), None);
        let response = request.send().await?;
        Self::decode(response, "getRouters").await
    }
}
