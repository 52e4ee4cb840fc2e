use serde::{Deserialize, Serialize};

use crate::constants::subkinds;
use crate::models::{ChatId, MessageIndex, StorageStatus, ThreadRead, UserSummary};

/// Domain events raised by the agent inside the worker and re-emitted by the
/// bridge client without being requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Read positions changed on another device
    #[serde(rename_all = "camelCase")]
    MessagesReadFromServer {
        chat_id: ChatId,
        read_by_me_up_to: Option<MessageIndex>,
        threads_read: Vec<ThreadRead>,
    },
    StorageUpdated { status: StorageStatus },
    UsersLoaded { users: Vec<UserSummary> },
}

impl AgentEvent {
    pub fn subkind(&self) -> &'static str {
        match self {
            AgentEvent::MessagesReadFromServer { .. } => subkinds::MESSAGES_READ_FROM_SERVER,
            AgentEvent::StorageUpdated { .. } => subkinds::STORAGE_UPDATED,
            AgentEvent::UsersLoaded { .. } => subkinds::USERS_LOADED,
        }
    }
}
