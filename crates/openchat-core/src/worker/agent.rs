use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::config::AgentConfig;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::events::AgentEvent;
use crate::models::{
    ArchiveChatResponse, BlockUserResponse, ChatStateSnapshot, CheckUsernameResponse,
    CurrentUserResponse, LeaveGroupResponse, MarkReadResponse, MessageIndex, PinChatResponse,
    SetBioResponse, SetUsernameResponse, StorageStatus, ThreadRead,
    ToggleMuteNotificationResponse, UnblockUserResponse, UnpinChatResponse, UpdatesResponse,
    UserId, UserLookup, UserSummary, UsersResponse,
};
use crate::protocol::WorkerError;
use crate::services::{OnlineClient, ServiceCaller, ServiceError, UserClient, UserIndexClient};
use crate::store::merge::{initial_state, merge_updates, MergedUpdates};
use crate::store::UserCache;

use super::identity::Identity;

/// Owns every service client for one signed-in identity and raises
/// [`AgentEvent`]s as side effects of the calls it makes.
pub struct OpenChatAgent {
    identity: Identity,
    caller: Arc<dyn ServiceCaller>,
    user_index: UserIndexClient,
    online: OnlineClient,
    /// Created lazily once the user's canister is known
    user_client: RwLock<Option<UserClient>>,
    /// Held while `current_user` is in flight so concurrent callers share one lookup
    resolving_user: tokio::sync::Mutex<()>,
    user_cache: Mutex<UserCache>,
    /// Orders disk writes of the user cache
    saving_cache: tokio::sync::Mutex<()>,
    events: broadcast::Sender<AgentEvent>,
}

impl OpenChatAgent {
    pub fn new(
        config: AgentConfig,
        identity: Identity,
        caller: Arc<dyn ServiceCaller>,
        user_cache: UserCache,
    ) -> Self {
        let user_index = UserIndexClient::new(caller.clone(), config.user_index_canister.clone());
        let online = OnlineClient::new(caller.clone(), config.online_canister.clone());
        let user_client = config
            .user_canister
            .as_ref()
            .map(|canister| UserClient::new(caller.clone(), canister.clone()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            identity,
            caller,
            user_index,
            online,
            user_client: RwLock::new(user_client),
            resolving_user: tokio::sync::Mutex::new(()),
            user_cache: Mutex::new(user_cache),
            saving_cache: tokio::sync::Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AgentEvent) {
        // No subscribers is fine: the dispatcher may not be listening yet.
        let _ = self.events.send(event);
    }

    /// Point the user client at `canister_id`, replacing any previous one.
    pub fn create_user_client(&self, canister_id: &str) -> UserClient {
        let client = UserClient::new(self.caller.clone(), canister_id);
        tracing::info!(
            principal = self.identity.principal(),
            canister_id = client.canister_id(),
            "User client created"
        );
        *self.user_client.write() = Some(client.clone());
        client
    }

    async fn user_client(&self) -> Result<UserClient, WorkerError> {
        let existing = self.user_client.read().clone();
        if let Some(client) = existing {
            return Ok(client);
        }

        let _resolving = self.resolving_user.lock().await;
        // Another caller may have resolved it while we waited
        let existing = self.user_client.read().clone();
        if let Some(client) = existing {
            return Ok(client);
        }

        match self.user_index.current_user().await? {
            CurrentUserResponse::CreatedUser(user) => Ok(self.create_user_client(&user.canister_id)),
            CurrentUserResponse::UnknownUser => {
                Err(ServiceError::MissingCanister { service: "user" }.into())
            }
        }
    }

    pub async fn get_current_user(&self) -> Result<CurrentUserResponse, WorkerError> {
        let response = self.user_index.current_user().await?;
        if let CurrentUserResponse::CreatedUser(user) = &response {
            let _ = self.create_user_client(&user.canister_id);
        }
        Ok(response)
    }

    pub async fn get_initial_state(&self) -> Result<MergedUpdates, WorkerError> {
        let resp = self.user_client().await?.initial_state().await?;
        tracing::debug!(
            "initial state: {} chats at timestamp {}",
            resp.chats.len(),
            resp.timestamp
        );
        Ok(initial_state(resp))
    }

    pub async fn get_updates(
        &self,
        current_state: ChatStateSnapshot,
    ) -> Result<MergedUpdates, WorkerError> {
        let since = current_state.updates_since();
        let delta = self.user_client().await?.updates(&since).await?;
        self.raise_read_changes(&current_state, &delta);
        Ok(merge_updates(current_state, delta))
    }

    /// Tell listeners about read positions that moved on another device.
    fn raise_read_changes(&self, current_state: &ChatStateSnapshot, delta: &UpdatesResponse) {
        for updated in &delta.chats_updated {
            let summary = &updated.summary;
            let changed = match current_state.chat(&summary.chat_id) {
                Some(previous) => {
                    previous.read_by_me_up_to != summary.read_by_me_up_to
                        || previous.threads_read != summary.threads_read
                }
                None => summary.read_by_me_up_to.is_some() || !summary.threads_read.is_empty(),
            };
            if changed {
                self.emit(AgentEvent::MessagesReadFromServer {
                    chat_id: summary.chat_id.clone(),
                    read_by_me_up_to: summary.read_by_me_up_to,
                    threads_read: summary.threads_read.clone(),
                });
            }
        }
    }

    /// With `allow_stale`, users already in the cache are answered from it and
    /// only the rest are fetched.
    pub async fn get_users(
        &self,
        user_ids: Vec<UserId>,
        allow_stale: bool,
    ) -> Result<UsersResponse, WorkerError> {
        let (mut cached, missing) = if allow_stale {
            self.partition_cached(user_ids)
        } else {
            (Vec::new(), user_ids)
        };

        if missing.is_empty() {
            return Ok(UsersResponse {
                server_timestamp: None,
                users: cached,
            });
        }

        let fetched = self.user_index.users(&missing).await?;
        self.cache_users(&fetched.users).await;
        if !fetched.users.is_empty() {
            self.emit(AgentEvent::UsersLoaded {
                users: fetched.users.clone(),
            });
        }

        cached.extend(fetched.users);
        Ok(UsersResponse {
            server_timestamp: fetched.server_timestamp,
            users: cached,
        })
    }

    fn partition_cached(&self, user_ids: Vec<UserId>) -> (Vec<UserSummary>, Vec<UserId>) {
        let cache = self.user_cache.lock();
        let mut cached = Vec::new();
        let mut missing = Vec::new();
        for id in user_ids {
            match cache.get(&id) {
                Some(user) => cached.push(user.clone()),
                None => missing.push(id),
            }
        }
        (cached, missing)
    }

    /// Update the in-memory cache, then write it to disk off the runtime.
    async fn cache_users(&self, users: &[UserSummary]) {
        if self.user_cache.lock().upsert(users) == 0 {
            return;
        }
        let _saving = self.saving_cache.lock().await;
        // Taken after the gate so the last write carries every upsert
        let snapshot = self.user_cache.lock().clone();
        match tokio::task::spawn_blocking(move || snapshot.save()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to persist user cache: {}", e),
            Err(e) => tracing::warn!("User cache save task failed: {}", e),
        }
    }

    pub fn get_all_cached_users(&self) -> UserLookup {
        self.user_cache.lock().all()
    }

    pub async fn check_username(
        &self,
        username: &str,
    ) -> Result<CheckUsernameResponse, WorkerError> {
        Ok(self.user_index.check_username(username).await?)
    }

    pub async fn set_username(&self, username: &str) -> Result<SetUsernameResponse, WorkerError> {
        Ok(self.user_index.set_username(username).await?)
    }

    pub async fn get_user_storage_limits(&self) -> Result<StorageStatus, WorkerError> {
        let status = self.user_index.storage_status().await?;
        self.emit(AgentEvent::StorageUpdated { status });
        Ok(status)
    }

    pub async fn mark_as_online(&self) -> Result<(), WorkerError> {
        Ok(self.online.mark_as_online().await?)
    }

    pub async fn mark_messages_read(
        &self,
        chat_id: &str,
        read_up_to: Option<MessageIndex>,
        threads: &[ThreadRead],
    ) -> Result<MarkReadResponse, WorkerError> {
        let client = self.user_client().await?;
        Ok(client.mark_read(chat_id, read_up_to, threads).await?)
    }

    pub async fn pin_chat(&self, chat_id: &str) -> Result<PinChatResponse, WorkerError> {
        Ok(self.user_client().await?.pin_chat(chat_id).await?)
    }

    pub async fn unpin_chat(&self, chat_id: &str) -> Result<UnpinChatResponse, WorkerError> {
        Ok(self.user_client().await?.unpin_chat(chat_id).await?)
    }

    pub async fn archive_chat(&self, chat_id: &str) -> Result<ArchiveChatResponse, WorkerError> {
        Ok(self.user_client().await?.archive_chat(chat_id).await?)
    }

    pub async fn unarchive_chat(&self, chat_id: &str) -> Result<ArchiveChatResponse, WorkerError> {
        Ok(self.user_client().await?.unarchive_chat(chat_id).await?)
    }

    pub async fn toggle_mute_notifications(
        &self,
        chat_id: &str,
        muted: bool,
    ) -> Result<ToggleMuteNotificationResponse, WorkerError> {
        let client = self.user_client().await?;
        Ok(client.toggle_mute_notifications(chat_id, muted).await?)
    }

    pub async fn block_user(&self, user_id: &str) -> Result<BlockUserResponse, WorkerError> {
        Ok(self.user_client().await?.block_user(user_id).await?)
    }

    pub async fn unblock_user(&self, user_id: &str) -> Result<UnblockUserResponse, WorkerError> {
        Ok(self.user_client().await?.unblock_user(user_id).await?)
    }

    pub async fn set_bio(&self, bio: &str) -> Result<SetBioResponse, WorkerError> {
        Ok(self.user_client().await?.set_bio(bio).await?)
    }

    /// A user's id doubles as their canister id.
    pub async fn get_bio(&self, user_id: Option<&str>) -> Result<String, WorkerError> {
        let client = match user_id {
            Some(id) => UserClient::new(self.caller.clone(), id),
            None => self.user_client().await?,
        };
        Ok(client.bio().await?)
    }

    pub async fn leave_group(&self, chat_id: &str) -> Result<LeaveGroupResponse, WorkerError> {
        Ok(self.user_client().await?.leave_group(chat_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::models::{ChatKind, ChatSummary};
    use crate::test_support::FakeServiceCaller;

    fn agent_with(
        caller: FakeServiceCaller,
        user_canister: Option<&str>,
    ) -> (OpenChatAgent, Arc<FakeServiceCaller>) {
        let caller = Arc::new(caller);
        let config = AgentConfig {
            user_canister: user_canister.map(str::to_string),
            ..AgentConfig::default()
        };
        let agent = OpenChatAgent::new(
            config,
            Identity::new("rrkah-fqaaa-aaaaa-aaaaq-cai"),
            caller.clone(),
            UserCache::in_memory(),
        );
        (agent, caller)
    }

    fn direct_chat(id: &str, read_up_to: Option<MessageIndex>) -> ChatSummary {
        ChatSummary {
            chat_id: id.to_string(),
            kind: ChatKind::Direct {
                them: "u2".to_string(),
            },
            latest_message: None,
            latest_event_index: 0,
            date_created: 1,
            read_by_me_up_to: read_up_to,
            threads_read: vec![],
            notifications_muted: false,
            archived: false,
            last_updated: 1,
        }
    }

    #[tokio::test]
    async fn test_user_canister_is_resolved_once() {
        let caller = FakeServiceCaller::new()
            .respond(
                "current_user",
                json!({
                    "kind": "created_user",
                    "userId": "u1",
                    "username": "alice",
                    "canisterId": "alice-cai"
                }),
            )
            .respond("pin_chat", json!({"kind": "success"}));
        let (agent, caller) = agent_with(caller, None);

        agent.pin_chat("c1").await.unwrap();
        agent.pin_chat("c2").await.unwrap();

        assert_eq!(caller.calls_to("current_user"), 1);
        let pins: Vec<_> = caller
            .calls()
            .into_iter()
            .filter(|(_, method, _)| method == "pin_chat")
            .collect();
        assert!(pins.iter().all(|(canister, _, _)| canister == "alice-cai"));
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_share_one_user_lookup() {
        let caller = FakeServiceCaller::new()
            .respond(
                "current_user",
                json!({
                    "kind": "created_user",
                    "userId": "u1",
                    "username": "alice",
                    "canisterId": "alice-cai"
                }),
            )
            .delay("current_user", Duration::from_millis(50))
            .respond("pin_chat", json!({"kind": "success"}))
            .respond("archive_chat", json!("success"));
        let (agent, caller) = agent_with(caller, None);

        let (pinned, archived) = tokio::join!(agent.pin_chat("c1"), agent.archive_chat("c2"));
        pinned.unwrap();
        archived.unwrap();

        assert_eq!(caller.calls_to("current_user"), 1);
    }

    #[tokio::test]
    async fn test_fetched_users_are_persisted() {
        let dir = tempdir().unwrap();
        let caller = Arc::new(FakeServiceCaller::new().respond(
            "users",
            json!({"serverTimestamp": 10, "users": [{"userId": "u2", "username": "bob", "updated": 10}]}),
        ));
        let agent = OpenChatAgent::new(
            AgentConfig::default(),
            Identity::new("rrkah-fqaaa-aaaaa-aaaaq-cai"),
            caller,
            UserCache::open(dir.path()),
        );

        agent.get_users(vec!["u2".to_string()], false).await.unwrap();

        let reopened = UserCache::open(dir.path());
        assert_eq!(
            reopened.get("u2").and_then(|u| u.username.as_deref()),
            Some("bob")
        );
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_user_canister() {
        let caller =
            FakeServiceCaller::new().respond("current_user", json!({"kind": "unknown_user"}));
        let (agent, _) = agent_with(caller, None);

        let err = agent.archive_chat("c1").await.unwrap_err();
        assert!(matches!(err, WorkerError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_stale_lookup_is_served_from_cache() {
        let caller = FakeServiceCaller::new().respond(
            "users",
            json!({"serverTimestamp": 10, "users": [{"userId": "u2", "username": "bob", "updated": 10}]}),
        );
        let (agent, caller) = agent_with(caller, Some("user-cai"));
        let mut events = agent.subscribe();

        let fresh = agent.get_users(vec!["u2".to_string()], false).await.unwrap();
        assert_eq!(fresh.users.len(), 1);
        assert!(matches!(
            events.try_recv(),
            Ok(AgentEvent::UsersLoaded { users }) if users.len() == 1
        ));

        let stale = agent.get_users(vec!["u2".to_string()], true).await.unwrap();
        assert_eq!(stale.users[0].username.as_deref(), Some("bob"));
        assert_eq!(stale.server_timestamp, None);
        assert_eq!(caller.calls_to("users"), 1);
        assert_eq!(agent.get_all_cached_users().len(), 1);
    }

    #[tokio::test]
    async fn test_read_position_change_raises_event() {
        let updated = direct_chat("c1", Some(9));
        let caller = FakeServiceCaller::new().respond(
            "updates",
            json!({
                "timestamp": 20,
                "chatsUpdated": [{"summary": serde_json::to_value(&updated).unwrap()}]
            }),
        );
        let (agent, _) = agent_with(caller, Some("user-cai"));
        let mut events = agent.subscribe();

        let current = ChatStateSnapshot {
            chat_summaries: vec![direct_chat("c1", Some(3))],
            timestamp: 10,
            ..ChatStateSnapshot::default()
        };
        let merged = agent.get_updates(current).await.unwrap();

        assert!(merged.was_updated);
        assert_eq!(merged.state.timestamp, 20);
        assert_eq!(
            events.try_recv().unwrap(),
            AgentEvent::MessagesReadFromServer {
                chat_id: "c1".to_string(),
                read_by_me_up_to: Some(9),
                threads_read: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_bio_of_another_user_targets_their_canister() {
        let caller = FakeServiceCaller::new().respond("bio", json!("hi there"));
        let (agent, caller) = agent_with(caller, Some("user-cai"));

        assert_eq!(agent.get_bio(Some("bob-cai")).await.unwrap(), "hi there");
        assert_eq!(caller.calls()[0].0, "bob-cai");
    }
}
