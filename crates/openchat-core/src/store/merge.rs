//! Incremental chat-state merge.
//!
//! Both the first full load and every later delta poll go through here so the
//! chat list always ends up in the same canonical order: pinned chats first,
//! in the order the server lists them, then everything else by most recent
//! activity.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{
    ChatId, ChatStateSnapshot, ChatSummary, EventIndex, InitialStateResponse, UpdatesResponse,
};

/// Result of merging a delta into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedUpdates {
    /// False when the delta carried nothing actionable; callers can skip
    /// re-rendering.
    pub was_updated: bool,
    pub state: ChatStateSnapshot,
}

/// Canonical chat ordering for the given pinned list.
pub fn compare_chats(pinned: &[ChatId]) -> impl Fn(&ChatSummary, &ChatSummary) -> Ordering + '_ {
    move |a, b| {
        let pin_a = pinned.iter().position(|id| *id == a.chat_id);
        let pin_b = pinned.iter().position(|id| *id == b.chat_id);
        match (pin_a, pin_b) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.activity_timestamp().cmp(&a.activity_timestamp()),
        }
    }
}

/// Stable sort, so chats that compare equal keep their relative order.
pub fn sort_chats(chats: &mut [ChatSummary], pinned: &[ChatId]) {
    chats.sort_by(compare_chats(pinned));
}

/// Build the first snapshot from a full initial-state response.
pub fn initial_state(resp: InitialStateResponse) -> MergedUpdates {
    let mut chats = resp.chats;
    sort_chats(&mut chats, &resp.pinned_chats);
    MergedUpdates {
        was_updated: true,
        state: ChatStateSnapshot {
            chat_summaries: chats,
            blocked_users: resp.blocked_users,
            pinned_chats: resp.pinned_chats,
            timestamp: resp.timestamp,
            avatar_id_update: None,
            affected_events: BTreeMap::new(),
        },
    }
}

/// Apply added/updated/removed chats to `chats`, without sorting.
///
/// Removal wins over an update or addition of the same id. Untouched chats
/// keep their relative order; new chats are appended in delta order.
pub fn merge_chat_updates(chats: Vec<ChatSummary>, delta: &UpdatesResponse) -> Vec<ChatSummary> {
    let removed = &delta.chats_removed;

    let mut incoming: HashMap<&str, &ChatSummary> = HashMap::new();
    for chat in &delta.chats_added {
        incoming.insert(chat.chat_id.as_str(), chat);
    }
    for updated in &delta.chats_updated {
        incoming.insert(updated.summary.chat_id.as_str(), &updated.summary);
    }

    let mut merged: Vec<ChatSummary> = Vec::with_capacity(chats.len() + incoming.len());
    for chat in chats {
        if removed.contains(&chat.chat_id) {
            continue;
        }
        match incoming.remove(chat.chat_id.as_str()) {
            Some(replacement) => merged.push(replacement.clone()),
            None => merged.push(chat),
        }
    }

    let new_chats = delta
        .chats_added
        .iter()
        .chain(delta.chats_updated.iter().map(|u| &u.summary));
    for chat in new_chats {
        if removed.contains(&chat.chat_id) {
            continue;
        }
        if let Some(summary) = incoming.remove(chat.chat_id.as_str()) {
            merged.push(summary.clone());
        }
    }

    merged
}

/// Reconcile `previous` with a server delta into a new snapshot.
///
/// The result timestamp is always the delta's; monotonicity is a server
/// guarantee and is not checked here.
pub fn merge_updates(previous: ChatStateSnapshot, delta: UpdatesResponse) -> MergedUpdates {
    if !delta.has_changes() {
        return MergedUpdates {
            was_updated: false,
            state: ChatStateSnapshot {
                timestamp: delta.timestamp,
                ..previous
            },
        };
    }

    let pinned_chats = delta
        .pinned_chats
        .clone()
        .unwrap_or(previous.pinned_chats);
    let blocked_users = delta
        .blocked_users
        .clone()
        .unwrap_or(previous.blocked_users);

    let mut chat_summaries = merge_chat_updates(previous.chat_summaries, &delta);
    sort_chats(&mut chat_summaries, &pinned_chats);

    let mut affected_events: BTreeMap<ChatId, BTreeSet<EventIndex>> = BTreeMap::new();
    for updated in &delta.chats_updated {
        let chat_id = &updated.summary.chat_id;
        if updated.affected_events.is_empty() || delta.chats_removed.contains(chat_id) {
            continue;
        }
        affected_events
            .entry(chat_id.clone())
            .or_default()
            .extend(updated.affected_events.iter().copied());
    }

    MergedUpdates {
        was_updated: true,
        state: ChatStateSnapshot {
            chat_summaries,
            blocked_users,
            pinned_chats,
            timestamp: delta.timestamp,
            avatar_id_update: delta.avatar_id_update,
            affected_events,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvatarIdUpdate, ChatKind, MessageSummary, UpdatedChat};

    fn chat(id: &str, ts: u64) -> ChatSummary {
        ChatSummary {
            chat_id: id.to_string(),
            kind: ChatKind::Direct {
                them: format!("user-{}", id),
            },
            latest_message: Some(MessageSummary {
                message_index: 0,
                event_index: 0,
                sender: format!("user-{}", id),
                timestamp: ts,
                text: String::new(),
            }),
            latest_event_index: 0,
            date_created: 0,
            read_by_me_up_to: None,
            threads_read: Vec::new(),
            notifications_muted: false,
            archived: false,
            last_updated: ts,
        }
    }

    fn updated(id: &str, ts: u64, affected: &[u32]) -> UpdatedChat {
        UpdatedChat {
            summary: chat(id, ts),
            affected_events: affected.to_vec(),
        }
    }

    fn snapshot(chats: Vec<ChatSummary>, pinned: &[&str], timestamp: u64) -> ChatStateSnapshot {
        ChatStateSnapshot {
            chat_summaries: chats,
            blocked_users: BTreeSet::from(["blocked".to_string()]),
            pinned_chats: pinned.iter().map(|s| s.to_string()).collect(),
            timestamp,
            avatar_id_update: None,
            affected_events: BTreeMap::new(),
        }
    }

    fn ids(state: &ChatStateSnapshot) -> Vec<&str> {
        state
            .chat_summaries
            .iter()
            .map(|c| c.chat_id.as_str())
            .collect()
    }

    #[test]
    fn test_noop_delta_only_advances_timestamp() {
        let previous = snapshot(vec![chat("a", 10), chat("b", 5)], &["b"], 10);
        let delta = UpdatesResponse {
            timestamp: 15,
            ..Default::default()
        };

        let merged = merge_updates(previous.clone(), delta);

        assert!(!merged.was_updated);
        assert_eq!(merged.state.timestamp, 15);
        assert_eq!(
            ChatStateSnapshot {
                timestamp: previous.timestamp,
                ..merged.state
            },
            previous
        );
    }

    #[test]
    fn test_noop_delta_is_idempotent() {
        let previous = snapshot(vec![chat("a", 10), chat("b", 5)], &[], 10);
        let delta = UpdatesResponse {
            timestamp: 11,
            ..Default::default()
        };

        let once = merge_updates(previous, delta.clone());
        let twice = merge_updates(once.state.clone(), delta);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_pinned_chat_sorts_before_more_recent_chats() {
        let previous = snapshot(vec![chat("A", 10), chat("B", 5)], &["A"], 10);
        let delta = UpdatesResponse {
            timestamp: 20,
            chats_added: vec![chat("C", 20)],
            chats_updated: vec![updated("B", 12, &[])],
            ..Default::default()
        };

        let merged = merge_updates(previous, delta);

        assert!(merged.was_updated);
        assert_eq!(ids(&merged.state), vec!["A", "C", "B"]);
        assert_eq!(merged.state.timestamp, 20);
        assert_eq!(merged.state.pinned_chats, vec!["A".to_string()]);
    }

    #[test]
    fn test_removed_chat_never_survives_even_if_updated() {
        let previous = snapshot(vec![chat("x", 10), chat("y", 5)], &[], 10);
        let delta = UpdatesResponse {
            timestamp: 11,
            chats_updated: vec![updated("x", 30, &[4, 5])],
            chats_added: vec![chat("z", 1)],
            chats_removed: BTreeSet::from(["x".to_string(), "z".to_string()]),
            ..Default::default()
        };

        let merged = merge_updates(previous, delta);

        assert_eq!(ids(&merged.state), vec!["y"]);
        assert!(merged.state.affected_events.is_empty());
    }

    #[test]
    fn test_affected_events_only_for_chats_with_indices() {
        let previous = snapshot(vec![chat("a", 10), chat("b", 5)], &[], 10);
        let delta = UpdatesResponse {
            timestamp: 12,
            chats_updated: vec![
                updated("a", 11, &[3, 1]),
                updated("b", 6, &[]),
                updated("a", 12, &[3, 7]),
            ],
            ..Default::default()
        };

        let merged = merge_updates(previous, delta);

        assert_eq!(merged.state.affected_events.len(), 1);
        assert_eq!(
            merged.state.affected_events["a"],
            BTreeSet::from([1, 3, 7])
        );
        // The last update for a chat wins.
        assert_eq!(
            merged.state.chat("a").unwrap().activity_timestamp(),
            12
        );
    }

    #[test]
    fn test_blocked_and_pinned_replaced_wholesale_or_carried() {
        let previous = snapshot(vec![chat("a", 10), chat("b", 5)], &["a"], 10);

        let carried = merge_updates(
            previous.clone(),
            UpdatesResponse {
                timestamp: 11,
                avatar_id_update: Some(AvatarIdUpdate::Set(77)),
                ..Default::default()
            },
        );
        assert!(carried.was_updated);
        assert_eq!(carried.state.blocked_users, previous.blocked_users);
        assert_eq!(carried.state.pinned_chats, previous.pinned_chats);
        assert_eq!(
            carried.state.avatar_id_update,
            Some(AvatarIdUpdate::Set(77))
        );

        let replaced = merge_updates(
            previous,
            UpdatesResponse {
                timestamp: 12,
                blocked_users: Some(BTreeSet::new()),
                pinned_chats: Some(vec!["b".to_string()]),
                ..Default::default()
            },
        );
        assert!(replaced.state.blocked_users.is_empty());
        assert_eq!(ids(&replaced.state), vec!["b", "a"]);
    }

    #[test]
    fn test_untouched_chats_keep_relative_order_on_ties() {
        let previous = snapshot(vec![chat("p", 5), chat("q", 5), chat("r", 5)], &[], 1);
        let delta = UpdatesResponse {
            timestamp: 2,
            chats_added: vec![chat("s", 9)],
            ..Default::default()
        };

        let merged = merge_updates(previous, delta);

        assert_eq!(ids(&merged.state), vec!["s", "p", "q", "r"]);
    }

    #[test]
    fn test_initial_state_is_sorted() {
        let merged = initial_state(InitialStateResponse {
            timestamp: 3,
            chats: vec![chat("old", 1), chat("new", 9), chat("pin", 0)],
            blocked_users: BTreeSet::new(),
            pinned_chats: vec!["pin".to_string()],
            cycles_balance: None,
        });

        assert!(merged.was_updated);
        assert_eq!(ids(&merged.state), vec!["pin", "new", "old"]);
        assert!(merged.state.affected_events.is_empty());
    }

    #[test]
    fn test_updates_since_lists_group_chats() {
        let mut group = chat("g", 4);
        group.kind = ChatKind::Group {
            name: "group".to_string(),
            description: String::new(),
            public: true,
            participant_count: 3,
        };
        let state = snapshot(vec![chat("d", 2), group], &[], 8);

        let since = state.updates_since();

        assert_eq!(since.timestamp, 8);
        assert_eq!(since.group_chats.len(), 1);
        assert_eq!(since.group_chats[0].chat_id, "g");
        assert_eq!(since.group_chats[0].updates_since, 4);
    }
}
