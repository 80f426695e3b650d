//! Wire shapes of the dashboard backend and the [`AdminApi`] seam.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;
use crate::types::{SessionData, UserId, null_as_default};

/// Backend status code. Some endpoints send numbers, some strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseCode {
    Number(i64),
    Text(String),
}

impl ResponseCode {
    /// `true` if the code is `expected` as a number or exactly its decimal string.
    #[must_use]
    pub fn is(&self, expected: i64) -> bool {
        match self {
            Self::Number(n) => *n == expected,
            Self::Text(s) => *s == expected.to_string(),
        }
    }

    /// `true` only for the numeric code `expected`.
    #[must_use]
    pub fn is_number(&self, expected: i64) -> bool {
        matches!(self, Self::Number(n) if *n == expected)
    }
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Login form body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Captcha answer, when the backend requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Captcha id paired with `code`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            code: None,
            uuid: None,
        }
    }

    #[must_use]
    pub fn with_captcha(mut self, code: impl Into<String>, uuid: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self.uuid = Some(uuid.into());
        self
    }
}

/// `POST /api/system/login` response. Success is code `200`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct LoginResponse {
    pub code: ResponseCode,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl LoginResponse {
    #[must_use]
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            token: None,
            user_name: None,
            msg: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }
}

/// Profile section of `getInfo`. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nick_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl UserProfile {
    #[must_use]
    pub fn new(user_id: UserId, user_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_nick_name(mut self, nick_name: impl Into<String>) -> Self {
        self.nick_name = nick_name.into();
        self
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfoData {
    pub user: UserProfile,
    /// `None` when the backend sends no roles; the session is then stored as
    /// a partial record.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: Vec<String>,
}

impl UserInfoData {
    #[must_use]
    pub fn new(user: UserProfile, roles: Vec<String>, permissions: Vec<String>) -> Self {
        Self {
            user,
            roles: Some(roles),
            permissions,
        }
    }
}

/// `GET /api/system/getInfo` response. Success is code `0` or `"0"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfoResponse {
    pub code: ResponseCode,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<UserInfoData>,
}

impl UserInfoResponse {
    #[must_use]
    pub fn new(code: ResponseCode, data: Option<UserInfoData>) -> Self {
        Self {
            code,
            msg: None,
            data,
        }
    }

    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }
}

/// `POST /api/refresh-token` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    #[must_use]
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
        }
    }
}

/// `POST /api/refresh-token` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<SessionData>,
}

impl RefreshResponse {
    #[must_use]
    pub fn new(data: Option<SessionData>) -> Self {
        Self {
            success: None,
            data,
        }
    }
}

/// Query string for `GET /system/getRouters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// `GET /system/getRouters` response. Route entries are passed through untyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RoutesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<ResponseCode>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Vec<JsonValue>,
}

impl RoutesResponse {
    #[must_use]
    pub fn new(data: Vec<JsonValue>) -> Self {
        Self {
            success: true,
            data,
            ..Self::default()
        }
    }
}

/// Remote calls the session layer depends on.
///
/// [`ApiClient`](crate::client::ApiClient) implements this over HTTP; tests
/// and alternative transports provide their own.
pub trait AdminApi: Send + Sync + 'static {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, Error>> + Send;

    /// Fetch the current user's profile. `authorization` is sent verbatim as
    /// the `Authorization` header and overrides any stored credential.
    fn get_user_info(
        &self,
        authorization: Option<&str>,
    ) -> impl Future<Output = Result<UserInfoResponse, Error>> + Send;

    /// `Ok(None)` when the endpoint answered with an empty body.
    fn refresh_token(
        &self,
        request: &RefreshRequest,
    ) -> impl Future<Output = Result<Option<RefreshResponse>, Error>> + Send;

    fn get_async_routes(
        &self,
        query: &RouteQuery,
    ) -> impl Future<Output = Result<RoutesResponse, Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_code_matches_number_and_string() {
        assert!(ResponseCode::Number(0).is(0));
        assert!(ResponseCode::Text("0".into()).is(0));
        assert!(ResponseCode::Number(200).is(200));
        assert!(!ResponseCode::Text("1".into()).is(0));
        assert!(!ResponseCode::Text("ok".into()).is(0));
    }

    #[test]
    fn response_code_rejects_near_miss_strings() {
        for code in ["00", "+0", " 0", "0 ", "-0"] {
            assert!(!ResponseCode::Text(code.into()).is(0), "{code:?}");
        }
    }

    #[test]
    fn numeric_code_check_ignores_strings() {
        assert!(ResponseCode::Number(200).is_number(200));
        assert!(!ResponseCode::Text("200".into()).is_number(200));
        assert!(!ResponseCode::Number(500).is_number(200));
    }

    #[test]
    fn user_info_tolerates_null_fields() {
        let json = r#"{
            "code": 0,
            "data": {
                "user": {"userId": 1, "userName": "a", "nickName": null},
                "roles": null,
                "permissions": null
            }
        }"#;
        let res: UserInfoResponse = serde_json::from_str(json).unwrap();
        let data = res.data.unwrap();
        assert_eq!(data.user.user_name, "a");
        assert_eq!(data.user.nick_name, "");
        assert_eq!(data.roles, None);
        assert!(data.permissions.is_empty());
    }

    #[test]
    fn login_response_from_backend() {
        let json = r#"{"code":200,"token":"T","userName":"alice"}"#;
        let res: LoginResponse = serde_json::from_str(json).unwrap();
        assert!(res.code.is(200));
        assert_eq!(res.token.as_deref(), Some("T"));
        assert_eq!(res.user_name.as_deref(), Some("alice"));
        assert_eq!(res.msg, None);
    }

    #[test]
    fn user_info_keeps_unknown_profile_fields() {
        let json = r#"{
            "code": "0",
            "msg": "ok",
            "data": {
                "user": {"userId": 1, "userName": "alice", "nickName": "Al", "avatar": "", "deptId": 103},
                "roles": ["admin"],
                "permissions": ["*:*:*"]
            }
        }"#;
        let res: UserInfoResponse = serde_json::from_str(json).unwrap();
        assert!(res.code.is(0));
        let data = res.data.unwrap();
        assert_eq!(data.user.user_id, Some(UserId(1)));
        assert_eq!(data.user.nick_name, "Al");
        assert_eq!(data.user.extra.get("deptId"), Some(&serde_json::json!(103)));
        assert_eq!(data.permissions, vec!["*:*:*".to_string()]);
    }

    #[test]
    fn credentials_omit_absent_captcha() {
        let json = serde_json::to_value(Credentials::new("admin", "admin123")).unwrap();
        assert_eq!(json, serde_json::json!({"username": "admin", "password": "admin123"}));

        let json =
            serde_json::to_value(Credentials::new("admin", "x").with_captcha("42", "u-1")).unwrap();
        assert_eq!(json["code"], "42");
        assert_eq!(json["uuid"], "u-1");
    }

    #[test]
    fn routes_response_tolerates_code_shape() {
        let json = r#"{"code":200,"msg":"ok","data":[{"path":"/system"}]}"#;
        let res: RoutesResponse = serde_json::from_str(json).unwrap();
        assert!(!res.success);
        assert_eq!(res.data.len(), 1);
        assert_eq!(res.code, Some(ResponseCode::Number(200)));
    }
}
