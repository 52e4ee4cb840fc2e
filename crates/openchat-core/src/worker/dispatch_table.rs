use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::agent::OpenChatAgent;
use crate::protocol::capability::{
    ArchiveChat, BlockUser, CheckUsername, GetAllCachedUsers, GetBio, GetCurrentUser,
    GetInitialState, GetUpdates, GetUserStorageLimits, GetUsers, LeaveGroup, MarkAsOnline,
    MarkMessagesRead, PinChat, SetBio, SetUsername, ToggleMuteNotifications, UnarchiveChat,
    UnblockUser, UnpinChat,
};
use crate::protocol::{Capability, WorkerError};

type Handler = Box<
    dyn Fn(Arc<OpenChatAgent>, serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, WorkerError>>
        + Send
        + Sync,
>;

/// Maps a request kind to the agent operation that serves it.
#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<&'static str, Handler>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `C::KIND`. The payload is decoded into `C`
    /// before the handler runs and the result encoded afterwards.
    pub fn register<C, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        C: Capability,
        F: Fn(Arc<OpenChatAgent>, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C::Response, WorkerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.handlers.insert(
            C::KIND,
            Box::new(move |agent, payload| {
                let handler = handler.clone();
                async move {
                    let request: C =
                        serde_json::from_value(payload).map_err(|e| WorkerError::InvalidPayload {
                            request_kind: C::KIND.to_string(),
                            message: e.to_string(),
                        })?;
                    let response = handler(agent, request).await?;
                    serde_json::to_value(response).map_err(|e| WorkerError::Internal {
                        message: format!("Failed to encode {} response: {}", C::KIND, e),
                    })
                }
                .boxed()
            }),
        );
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Handler> {
        self.handlers.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Every capability the agent serves.
    pub fn for_agent() -> Self {
        let mut table = Self::new();
        table
            .register::<GetCurrentUser, _, _>(|agent, _| async move {
                agent.get_current_user().await
            })
            .register::<GetInitialState, _, _>(|agent, _| async move {
                agent.get_initial_state().await
            })
            .register::<GetUpdates, _, _>(|agent, req| async move {
                agent.get_updates(req.current_state).await
            })
            .register::<GetUsers, _, _>(|agent, req| async move {
                agent.get_users(req.user_ids, req.allow_stale).await
            })
            .register::<GetAllCachedUsers, _, _>(|agent, _| async move {
                Ok::<_, WorkerError>(agent.get_all_cached_users())
            })
            .register::<CheckUsername, _, _>(|agent, req| async move {
                agent.check_username(&req.username).await
            })
            .register::<SetUsername, _, _>(|agent, req| async move {
                agent.set_username(&req.username).await
            })
            .register::<GetUserStorageLimits, _, _>(|agent, _| async move {
                agent.get_user_storage_limits().await
            })
            .register::<MarkAsOnline, _, _>(|agent, _| async move {
                agent.mark_as_online().await
            })
            .register::<MarkMessagesRead, _, _>(|agent, req| async move {
                agent
                    .mark_messages_read(&req.chat_id, req.read_up_to, &req.threads)
                    .await
            })
            .register::<PinChat, _, _>(|agent, req| async move {
                agent.pin_chat(&req.chat_id).await
            })
            .register::<UnpinChat, _, _>(|agent, req| async move {
                agent.unpin_chat(&req.chat_id).await
            })
            .register::<ArchiveChat, _, _>(|agent, req| async move {
                agent.archive_chat(&req.chat_id).await
            })
            .register::<UnarchiveChat, _, _>(|agent, req| async move {
                agent.unarchive_chat(&req.chat_id).await
            })
            .register::<ToggleMuteNotifications, _, _>(|agent, req| async move {
                agent
                    .toggle_mute_notifications(&req.chat_id, req.muted)
                    .await
            })
            .register::<BlockUser, _, _>(|agent, req| async move {
                agent.block_user(&req.user_id).await
            })
            .register::<UnblockUser, _, _>(|agent, req| async move {
                agent.unblock_user(&req.user_id).await
            })
            .register::<SetBio, _, _>(|agent, req| async move { agent.set_bio(&req.bio).await })
            .register::<GetBio, _, _>(|agent, req| async move {
                agent.get_bio(req.user_id.as_deref()).await
            })
            .register::<LeaveGroup, _, _>(|agent, req| async move {
                agent.leave_group(&req.chat_id).await
            });
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::kinds;

    #[test]
    fn test_agent_table_covers_every_capability_but_init() {
        let table = DispatchTable::for_agent();
        assert_eq!(table.len(), 20);
        assert!(table.contains("getUpdates"));
        assert!(table.contains("blockUserFromDirectChat"));
        assert!(!table.contains(kinds::INIT));
        assert!(!table.contains("someFutureCapability"));
    }
}
