use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::error::Error;

/// Backend user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Access token expiry as epoch milliseconds.
///
/// Deserializes from a number (epoch ms), an RFC 3339 string, or the
/// `YYYY/MM/DD HH:MM:SS` form (read as UTC). Zero means "no enforced expiry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Expires(i64);

impl Expires {
    pub const NEVER: Self = Self(0);

    #[must_use]
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub fn at(instant: OffsetDateTime) -> Self {
        Self((instant.unix_timestamp_nanos() / 1_000_000) as i64)
    }

    #[must_use]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// The expiry instant, or `None` for [`Expires::NEVER`].
    #[must_use]
    pub fn instant(self) -> Option<OffsetDateTime> {
        if self.0 <= 0 {
            return None;
        }
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000).ok()
    }
}

impl std::str::FromStr for Expires {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::NEVER);
        }
        if let Ok(ms) = s.parse::<i64>() {
            return Ok(Self(ms));
        }
        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
            return Ok(Self::at(dt));
        }
        let slashed = format_description!("[year]/[month]/[day] [hour]:[minute]:[second]");
        time::PrimitiveDateTime::parse(s, slashed)
            .map(|dt| Self::at(dt.assume_utc()))
            .map_err(|e| Error::Decode(format!("expires `{s}`: {e}")))
    }
}

impl Serialize for Expires {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Expires {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Self(ms)),
            Raw::Float(ms) => Ok(Self(ms as i64)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Input to [`CredentialStore::set`](crate::CredentialStore::set).
///
/// A record carrying a non-empty `username` and `roles` is a *full* record and
/// replaces the stored display fields. Anything else is *partial*: only the
/// token fields change and the stored display fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct SessionData {
    pub access_token: String,
    #[serde(default)]
    pub expires: Option<Expires>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl SessionData {
    /// Token-only session data.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expires(mut self, expires: Expires) -> Self {
        self.expires = Some(expires);
        self
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = Some(roles);
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// `true` if this record carries fresh identity data.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty()) && self.roles.is_some()
    }
}

/// Session as read back from the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Empty when only the durable record survived.
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch ms, `0` for no enforced expiry.
    pub expires_at: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub user_id: Option<UserId>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// Payload of the `authorized-token` cookie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenCookie {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) refresh_token: String,
    #[serde(default)]
    pub(crate) user_id: Option<UserId>,
}

/// Durable `user-info` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct UserRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) refresh_token: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) expires: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) avatar: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) nickname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) roles: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) permissions: Vec<String>,
    pub(crate) user_id: Option<UserId>,
}

// Stored records and some backend payloads carry `null` for absent fields.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
