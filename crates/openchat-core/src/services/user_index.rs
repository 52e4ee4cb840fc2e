use std::sync::Arc;

use serde_json::json;

use super::{call_typed, ServiceCaller, ServiceError};
use crate::models::{
    CheckUsernameResponse, CurrentUserResponse, SetUsernameResponse, StorageStatus, UserId,
    UsersResponse,
};

/// Client for the user index, the directory of all registered users.
#[derive(Clone)]
pub struct UserIndexClient {
    caller: Arc<dyn ServiceCaller>,
    canister_id: String,
}

impl UserIndexClient {
    pub fn new(caller: Arc<dyn ServiceCaller>, canister_id: impl Into<String>) -> Self {
        Self {
            caller,
            canister_id: canister_id.into(),
        }
    }

    pub async fn current_user(&self) -> Result<CurrentUserResponse, ServiceError> {
        self.call("current_user", &json!({})).await
    }

    pub async fn users(&self, user_ids: &[UserId]) -> Result<UsersResponse, ServiceError> {
        self.call("users", &json!({ "userIds": user_ids })).await
    }

    pub async fn check_username(
        &self,
        username: &str,
    ) -> Result<CheckUsernameResponse, ServiceError> {
        self.call("check_username", &json!({ "username": username }))
            .await
    }

    pub async fn set_username(&self, username: &str) -> Result<SetUsernameResponse, ServiceError> {
        self.call("set_username", &json!({ "username": username }))
            .await
    }

    pub async fn storage_status(&self) -> Result<StorageStatus, ServiceError> {
        self.call("user_storage", &json!({})).await
    }

    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<R, ServiceError> {
        call_typed(self.caller.as_ref(), &self.canister_id, method, args).await
    }
}
