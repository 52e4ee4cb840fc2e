use serde::{Deserialize, Serialize};

pub type ChatId = String;
pub type UserId = String;
pub type EventIndex = u32;
pub type MessageIndex = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatKind {
    Direct {
        them: UserId,
    },
    Group {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        public: bool,
        #[serde(default, rename = "participantCount")]
        participant_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub message_index: MessageIndex,
    pub event_index: EventIndex,
    pub sender: UserId,
    /// Milliseconds since epoch
    pub timestamp: u64,
    #[serde(default)]
    pub text: String,
}

/// Read position inside a single thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRead {
    pub root_message_index: MessageIndex,
    pub read_up_to: MessageIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: ChatId,
    #[serde(flatten)]
    pub kind: ChatKind,
    #[serde(default)]
    pub latest_message: Option<MessageSummary>,
    #[serde(default)]
    pub latest_event_index: EventIndex,
    pub date_created: u64,
    #[serde(default)]
    pub read_by_me_up_to: Option<MessageIndex>,
    #[serde(default)]
    pub threads_read: Vec<ThreadRead>,
    #[serde(default)]
    pub notifications_muted: bool,
    #[serde(default)]
    pub archived: bool,
    /// Server timestamp of the last change to this chat
    #[serde(default)]
    pub last_updated: u64,
}

impl ChatSummary {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group { .. })
    }

    /// Timestamp used for recency ordering: the latest message, or the
    /// creation date for chats without messages.
    pub fn activity_timestamp(&self) -> u64 {
        self.latest_message
            .as_ref()
            .map(|m| m.timestamp)
            .unwrap_or(self.date_created)
    }

    /// Number of messages after `read_by_me_up_to`.
    pub fn unread_count(&self) -> u32 {
        let Some(latest) = self.latest_message.as_ref() else {
            return 0;
        };
        match self.read_by_me_up_to {
            Some(read) => latest.message_index.saturating_sub(read),
            None => latest.message_index.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(latest: Option<u32>, read: Option<u32>) -> ChatSummary {
        ChatSummary {
            chat_id: "chat".to_string(),
            kind: ChatKind::Direct {
                them: "them".to_string(),
            },
            latest_message: latest.map(|index| MessageSummary {
                message_index: index,
                event_index: index,
                sender: "them".to_string(),
                timestamp: 100,
                text: String::new(),
            }),
            latest_event_index: latest.unwrap_or(0),
            date_created: 7,
            read_by_me_up_to: read,
            threads_read: Vec::new(),
            notifications_muted: false,
            archived: false,
            last_updated: 0,
        }
    }

    #[test]
    fn test_activity_timestamp_falls_back_to_creation() {
        assert_eq!(summary(None, None).activity_timestamp(), 7);
        assert_eq!(summary(Some(3), None).activity_timestamp(), 100);
    }

    #[test]
    fn test_unread_count() {
        assert_eq!(summary(None, None).unread_count(), 0);
        assert_eq!(summary(Some(4), None).unread_count(), 5);
        assert_eq!(summary(Some(4), Some(2)).unread_count(), 2);
        assert_eq!(summary(Some(4), Some(9)).unread_count(), 0);
        assert_eq!(summary(Some(u32::MAX), None).unread_count(), u32::MAX);
    }

    #[test]
    fn test_chat_kind_is_flattened() {
        let json = serde_json::to_value(summary(None, None)).unwrap();
        assert_eq!(json["kind"], "direct");
        assert_eq!(json["them"], "them");
        assert_eq!(json["chatId"], "chat");
    }
}
