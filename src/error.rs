/// Errors surfaced by the session layer.
///
/// Every failure is reported to the caller; nothing here retries.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Login endpoint answered with a non-success code, or no token.
    #[error("login failed: {0}")]
    Login(String),

    /// Profile fetch failed after a successful login. Nothing was persisted.
    #[error("failed to fetch user info: {message}")]
    ProfileFetch {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Token refresh failed or returned an empty response.
    #[error("token refresh failed: {message}")]
    Refresh {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    /// Persistence backend failure (filesystem or serialization).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn profile(message: impl Into<String>) -> Self {
        Self::ProfileFetch {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn refresh(message: impl Into<String>) -> Self {
        Self::Refresh {
            message: message.into(),
            source: None,
        }
    }
}
