use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::chat::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    /// Seconds since the user was last seen online
    #[serde(default)]
    pub seconds_since_last_online: u64,
    /// Server timestamp of this summary, used to decide staleness
    pub updated: u64,
}

pub type UserLookup = HashMap<UserId, UserSummary>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersResponse {
    pub server_timestamp: Option<u64>,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub user_id: UserId,
    pub username: String,
    /// Canister hosting this user's chats
    pub canister_id: String,
    #[serde(default)]
    pub cycles: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurrentUserResponse {
    CreatedUser(CreatedUser),
    UnknownUser,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    pub byte_limit: u64,
    pub bytes_used: u64,
}

impl StorageStatus {
    pub fn percent_used(&self) -> f64 {
        if self.byte_limit == 0 {
            return 0.0;
        }
        self.bytes_used as f64 / self.byte_limit as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckUsernameResponse {
    Success,
    UsernameTaken,
    UsernameInvalid,
    UsernameTooShort,
    UsernameTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetUsernameResponse {
    Success,
    NoChange,
    UsernameTaken,
    UserNotFound,
    UsernameInvalid,
    UsernameTooShort,
    UsernameTooLong,
}
