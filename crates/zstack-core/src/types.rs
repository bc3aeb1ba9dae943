//! Wire types shared by the session and resource clients.

use crate::uuid::{AccountUuid, UserUuid};
use serde::{Deserialize, Serialize};

/// Prefix of every management API path.
pub const API_PREFIX: &str = "/zstack/v1";

/// Login path, relative to the endpoint.
pub const LOGIN_PATH: &str = "/zstack/v1/accounts/login";

/// Session path for `token`, relative to the endpoint.
#[must_use]
pub fn session_path(token: &str) -> String {
    format!("{API_PREFIX}/accounts/sessions/{token}")
}

/// System and user tags attached to API messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    /// System tags
    #[serde(default)]
    pub system_tags: Vec<String>,
    /// User tags
    #[serde(default)]
    pub user_tags: Vec<String>,
}

/// Account credentials as sent in the login message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogInByAccount {
    /// Account name
    pub account_name: String,
    /// Hex-encoded SHA-512 digest of the password
    pub password: String,
}

/// Body of `PUT /zstack/v1/accounts/login`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Credentials
    pub log_in_by_account: LogInByAccount,
    /// Tags
    #[serde(flatten)]
    pub tags: Tags,
}

/// Session inventory returned by a successful login.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInventory {
    /// Session token
    #[serde(default)]
    pub uuid: String,
    /// Owning account
    #[serde(default, deserialize_with = "crate::uuid::deserialize_optional")]
    pub account_uuid: Option<AccountUuid>,
    /// IAM user, when logged in as one
    #[serde(default, deserialize_with = "crate::uuid::deserialize_optional")]
    pub user_uuid: Option<UserUuid>,
    /// Expiry as formatted by the server
    #[serde(default)]
    pub expired_date: Option<String>,
    /// Creation time as formatted by the server
    #[serde(default)]
    pub create_date: Option<String>,
}

/// Body of a successful login response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Session inventory
    pub inventory: SessionInventory,
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsyncEnvelope {
    /// Absolute URL to poll for the job result
    pub location: String,
}

/// Fields every inventory object carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBase<Id> {
    /// Resource UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Id>,
    /// Creation time as formatted by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    /// Last operation time as formatted by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_op_date: Option<String>,
}

impl<Id> Default for ResourceBase<Id> {
    fn default() -> Self {
        Self {
            uuid: None,
            create_date: None,
            last_op_date: None,
        }
    }
}
