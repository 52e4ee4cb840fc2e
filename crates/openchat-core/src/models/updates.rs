use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::chat::{ChatId, ChatSummary, EventIndex, UserId};

/// Change to the current user's avatar reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "blobId", rename_all = "snake_case")]
pub enum AvatarIdUpdate {
    Removed,
    Set(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub index: u64,
    pub timestamp: u64,
    pub token: String,
    pub amount: u64,
}

/// A chat touched since the last poll, with the event indices the change affected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedChat {
    pub summary: ChatSummary,
    #[serde(default)]
    pub affected_events: Vec<EventIndex>,
}

/// Server-reported diff since a given timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesResponse {
    pub timestamp: u64,
    #[serde(default)]
    pub chats_added: Vec<ChatSummary>,
    #[serde(default)]
    pub chats_updated: Vec<UpdatedChat>,
    #[serde(default)]
    pub chats_removed: BTreeSet<ChatId>,
    #[serde(default)]
    pub blocked_users: Option<BTreeSet<UserId>>,
    #[serde(default)]
    pub pinned_chats: Option<Vec<ChatId>>,
    #[serde(default)]
    pub avatar_id_update: Option<AvatarIdUpdate>,
    #[serde(default)]
    pub cycles_balance: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl UpdatesResponse {
    /// True when the delta carries anything a client must act on.
    pub fn has_changes(&self) -> bool {
        self.blocked_users.is_some()
            || self.pinned_chats.is_some()
            || !self.chats_updated.is_empty()
            || !self.chats_added.is_empty()
            || !self.chats_removed.is_empty()
            || self.avatar_id_update.is_some()
            || self.cycles_balance.is_some()
            || !self.transactions.is_empty()
    }
}

/// Full chat list returned by the user service on first load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialStateResponse {
    pub timestamp: u64,
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
    #[serde(default)]
    pub blocked_users: BTreeSet<UserId>,
    #[serde(default)]
    pub pinned_chats: Vec<ChatId>,
    #[serde(default)]
    pub cycles_balance: Option<u64>,
}

/// The client's fully merged view of chat state at a point in logical time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStateSnapshot {
    pub chat_summaries: Vec<ChatSummary>,
    #[serde(default)]
    pub blocked_users: BTreeSet<UserId>,
    #[serde(default)]
    pub pinned_chats: Vec<ChatId>,
    pub timestamp: u64,
    #[serde(default)]
    pub avatar_id_update: Option<AvatarIdUpdate>,
    #[serde(default)]
    pub affected_events: BTreeMap<ChatId, BTreeSet<EventIndex>>,
}

impl ChatStateSnapshot {
    pub fn chat(&self, chat_id: &str) -> Option<&ChatSummary> {
        self.chat_summaries.iter().find(|c| c.chat_id == chat_id)
    }

    /// Arguments for the next delta poll.
    pub fn updates_since(&self) -> UpdatesSince {
        UpdatesSince {
            timestamp: self.timestamp,
            group_chats: self
                .chat_summaries
                .iter()
                .filter(|c| c.is_group())
                .map(|c| GroupChatUpdatesSince {
                    chat_id: c.chat_id.clone(),
                    updates_since: c.last_updated,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupChatUpdatesSince {
    pub chat_id: ChatId,
    pub updates_since: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesSince {
    pub timestamp: u64,
    pub group_chats: Vec<GroupChatUpdatesSince>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_delta_has_no_changes() {
        let delta = UpdatesResponse {
            timestamp: 42,
            ..Default::default()
        };
        assert!(!delta.has_changes());
    }

    #[test]
    fn test_balance_or_transactions_count_as_changes() {
        let balance = UpdatesResponse {
            timestamp: 1,
            cycles_balance: Some(10),
            ..Default::default()
        };
        assert!(balance.has_changes());

        let transactions = UpdatesResponse {
            timestamp: 1,
            transactions: vec![Transaction {
                index: 0,
                timestamp: 1,
                token: "ICP".to_string(),
                amount: 5,
            }],
            ..Default::default()
        };
        assert!(transactions.has_changes());
    }

    #[test]
    fn test_avatar_update_wire_shape() {
        let json = serde_json::to_value(AvatarIdUpdate::Set(9)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "set", "blobId": 9}));
        let removed: AvatarIdUpdate =
            serde_json::from_value(serde_json::json!({"kind": "removed"})).unwrap();
        assert_eq!(removed, AvatarIdUpdate::Removed);
    }
}
