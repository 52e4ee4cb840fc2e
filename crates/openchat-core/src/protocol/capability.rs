//! Request types understood by the worker.
//!
//! Every request is a plain struct bound to the request-kind string it travels
//! under and to the response type the worker answers with. The bridge client
//! and the dispatch table are both generic over [`Capability`], so adding a
//! capability is one struct plus one handler registration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::models::{
    ArchiveChatResponse, BlockUserResponse, ChatId, ChatStateSnapshot, CheckUsernameResponse,
    CurrentUserResponse, LeaveGroupResponse, MarkReadResponse, MessageIndex, PinChatResponse,
    SetBioResponse, SetUsernameResponse, StorageStatus, ThreadRead,
    ToggleMuteNotificationResponse, UnblockUserResponse, UnpinChatResponse, UserId, UserLookup,
    UsersResponse,
};
use crate::store::merge::MergedUpdates;

pub trait Capability: Serialize + DeserializeOwned + Send + 'static {
    /// Request kind on the wire
    const KIND: &'static str;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

macro_rules! capability {
    ($ty:ty => $kind:literal, $response:ty) => {
        impl Capability for $ty {
            const KIND: &'static str = $kind;
            type Response = $response;
        }
    };
}

/// Constructs the worker's agent. Handled by the dispatcher itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Init(pub AgentConfig);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetCurrentUser;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetInitialState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUpdates {
    pub current_state: ChatStateSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUsers {
    pub user_ids: Vec<UserId>,
    #[serde(default)]
    pub allow_stale: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetAllCachedUsers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckUsername {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUsername {
    pub username: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetUserStorageLimits;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarkAsOnline;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkMessagesRead {
    pub chat_id: ChatId,
    pub read_up_to: Option<MessageIndex>,
    #[serde(default)]
    pub threads: Vec<ThreadRead>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinChat {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpinChat {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveChat {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnarchiveChat {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleMuteNotifications {
    pub chat_id: ChatId,
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUser {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnblockUser {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBio {
    pub bio: String,
}

/// Bio of `user_id`, or of the current user when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBio {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGroup {
    pub chat_id: ChatId,
}

capability!(Init => "init", ());
capability!(GetCurrentUser => "getCurrentUser", CurrentUserResponse);
capability!(GetInitialState => "getInitialState", MergedUpdates);
capability!(GetUpdates => "getUpdates", MergedUpdates);
capability!(GetUsers => "getUsers", UsersResponse);
capability!(GetAllCachedUsers => "getAllCachedUsers", UserLookup);
capability!(CheckUsername => "checkUsername", CheckUsernameResponse);
capability!(SetUsername => "setUsername", SetUsernameResponse);
capability!(GetUserStorageLimits => "getUserStorageLimits", StorageStatus);
capability!(MarkAsOnline => "markAsOnline", ());
capability!(MarkMessagesRead => "markMessagesRead", MarkReadResponse);
capability!(PinChat => "pinChat", PinChatResponse);
capability!(UnpinChat => "unpinChat", UnpinChatResponse);
capability!(ArchiveChat => "archiveChat", ArchiveChatResponse);
capability!(UnarchiveChat => "unarchiveChat", ArchiveChatResponse);
capability!(ToggleMuteNotifications => "toggleMuteNotifications", ToggleMuteNotificationResponse);
capability!(BlockUser => "blockUserFromDirectChat", BlockUserResponse);
capability!(UnblockUser => "unblockUserFromDirectChat", UnblockUserResponse);
capability!(SetBio => "setBio", SetBioResponse);
capability!(GetBio => "getBio", String);
capability!(LeaveGroup => "leaveGroup", LeaveGroupResponse);
