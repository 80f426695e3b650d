#![doc = include_str!("../README.md")]

pub mod api;
#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod permission;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;

// Re-exports for convenient access
pub use api::{
    AdminApi, Credentials, LoginResponse, RefreshRequest, RefreshResponse, ResponseCode,
    RouteQuery, RoutesResponse, UserInfoData, UserInfoResponse, UserProfile,
};
#[cfg(feature = "http")]
pub use client::{ApiClient, ClientConfig};
pub use config::SessionConfig;
pub use credential::{CredentialStore, format_token};
pub use error::Error;
pub use permission::{ALL_PERMISSIONS, PermissionQuery, has_permission};
pub use session::{LoginOutcome, Navigator, NoopNavigator, SessionManager};
pub use state::{SessionState, UserState};
pub use storage::{CookieStore, FileStorage, LocalStorage, MemoryStorage};
pub use types::{Expires, SessionData, SessionRecord, UserId};
