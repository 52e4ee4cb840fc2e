use std::sync::Arc;

use serde_json::json;

use super::{call_typed, ServiceCaller, ServiceError};
use crate::models::{
    ArchiveChatResponse, BlockUserResponse, InitialStateResponse, LeaveGroupResponse,
    MarkReadResponse, MessageIndex, PinChatResponse, SetBioResponse, ThreadRead,
    ToggleMuteNotificationResponse, UnblockUserResponse, UnpinChatResponse, UpdatesResponse,
    UpdatesSince,
};

/// Client for the current user's own canister.
#[derive(Clone)]
pub struct UserClient {
    caller: Arc<dyn ServiceCaller>,
    canister_id: String,
}

impl UserClient {
    pub fn new(caller: Arc<dyn ServiceCaller>, canister_id: impl Into<String>) -> Self {
        Self {
            caller,
            canister_id: canister_id.into(),
        }
    }

    pub fn canister_id(&self) -> &str {
        &self.canister_id
    }

    pub async fn initial_state(&self) -> Result<InitialStateResponse, ServiceError> {
        self.call("initial_state", &json!({ "disableCache": false }))
            .await
    }

    pub async fn updates(&self, since: &UpdatesSince) -> Result<UpdatesResponse, ServiceError> {
        self.call("updates", &json!({ "updatesSince": since })).await
    }

    pub async fn mark_read(
        &self,
        chat_id: &str,
        read_up_to: Option<MessageIndex>,
        threads: &[ThreadRead],
    ) -> Result<MarkReadResponse, ServiceError> {
        self.call(
            "mark_read",
            &json!({ "chatId": chat_id, "readUpTo": read_up_to, "threads": threads }),
        )
        .await
    }

    pub async fn pin_chat(&self, chat_id: &str) -> Result<PinChatResponse, ServiceError> {
        self.call("pin_chat", &json!({ "chatId": chat_id })).await
    }

    pub async fn unpin_chat(&self, chat_id: &str) -> Result<UnpinChatResponse, ServiceError> {
        self.call("unpin_chat", &json!({ "chatId": chat_id })).await
    }

    pub async fn archive_chat(&self, chat_id: &str) -> Result<ArchiveChatResponse, ServiceError> {
        self.call("archive_chat", &json!({ "chatId": chat_id })).await
    }

    pub async fn unarchive_chat(
        &self,
        chat_id: &str,
    ) -> Result<ArchiveChatResponse, ServiceError> {
        self.call("unarchive_chat", &json!({ "chatId": chat_id }))
            .await
    }

    pub async fn toggle_mute_notifications(
        &self,
        chat_id: &str,
        muted: bool,
    ) -> Result<ToggleMuteNotificationResponse, ServiceError> {
        let method = if muted {
            "mute_notifications"
        } else {
            "unmute_notifications"
        };
        self.call(method, &json!({ "chatId": chat_id })).await
    }

    pub async fn block_user(&self, user_id: &str) -> Result<BlockUserResponse, ServiceError> {
        self.call("block_user", &json!({ "userId": user_id })).await
    }

    pub async fn unblock_user(&self, user_id: &str) -> Result<UnblockUserResponse, ServiceError> {
        self.call("unblock_user", &json!({ "userId": user_id })).await
    }

    pub async fn set_bio(&self, bio: &str) -> Result<SetBioResponse, ServiceError> {
        self.call("set_bio", &json!({ "text": bio })).await
    }

    pub async fn bio(&self) -> Result<String, ServiceError> {
        self.call("bio", &json!({})).await
    }

    pub async fn leave_group(&self, chat_id: &str) -> Result<LeaveGroupResponse, ServiceError> {
        self.call("leave_group", &json!({ "chatId": chat_id })).await
    }

    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<R, ServiceError> {
        call_typed(self.caller.as_ref(), &self.canister_id, method, args).await
    }
}
